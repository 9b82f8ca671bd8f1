//! Self-bootstrapping launcher
//!
//! The bootstrapper resolves the directory to build, makes sure a build tool
//! version is available (from the local [`PackageCache`] or a download
//! command) and relaunches it with the original arguments under a deadline.
//!
//! ```no_run
//! use arbor::bootstrap::{BootstrapOptions, Launcher};
//! use arbor::infrastructure::BootstrapConfig;
//! use arbor::variables::BuildContext;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> arbor::Result<()> {
//! let options = BootstrapOptions::parse(["--download-only"])?;
//! let launcher = Launcher::new(BootstrapConfig::default(), BuildContext::from_process_env(), ".");
//! let outcome = launcher.run(&options, &CancellationToken::new()).await;
//! println!("{} after {:?}", outcome.exit_code, outcome.history);
//! # Ok(())
//! # }
//! ```

mod acquire;
mod base_dir;
mod launcher;
mod locate;
mod options;
mod state;

pub use acquire::{
    AcquiredPackage, BuildToolSource, CommandSource, PackageCache, PackageVersion,
    VersionSelector, copy_dir,
};
pub use base_dir::{find_vcs_root, resolve_base_directory};
pub use launcher::{LaunchOutcome, Launcher};
pub use locate::locate_entry_point;
pub use options::{
    BASE_DIRECTORY_FLAG, BRANCH_NAME_FLAG, BUILD_DIRECTORY_FLAG, BUILD_EXE_FLAG,
    BootstrapOptions, DOWNLOAD_ONLY_FLAG, PRERELEASE_FLAG, VERSION_FLAG,
};
pub use state::{LauncherState, StateMachine};
