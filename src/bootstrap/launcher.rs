//! Bootstrap launcher
//!
//! The launcher finds the directory to build, acquires a build tool version
//! and relaunches it under an overall deadline. Every step is recorded in a
//! [`StateMachine`] so callers can see how far a run got.

use super::acquire::{
    AcquiredPackage, BuildToolSource, CommandSource, PackageCache, PackageVersion,
    VersionSelector, copy_dir,
};
use super::base_dir::resolve_base_directory;
use super::locate::locate_entry_point;
use super::options::{
    BASE_DIRECTORY_FLAG, BRANCH_NAME_FLAG, BUILD_DIRECTORY_FLAG, BootstrapOptions,
};
use super::state::{LauncherState, StateMachine};
use crate::errors::{ArborError, Result};
use crate::executor::{
    Deadline, ExitCode, LineCallback, ProcessInvocation, ProcessSupervisor, TempWorkspace,
};
use crate::infrastructure::{BootstrapConfig, MAX_EXIT_DELAY};
use crate::variables::BuildContext;
use crate::variables::well_known::{
    BOOTSTRAPPER_EXIT_DELAY_MS, BOOTSTRAPPER_TIMEOUT_SECONDS, BOOTSTRAPPER_VERSION,
    BUILD_DIRECTORY, DIRECTORY_CLONE_ENABLED, PACKAGE_CACHE, PRERELEASE_ALLOWED, SOURCE_ROOT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one launcher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// `SUCCESS` or `FAILURE`
    pub exit_code: ExitCode,
    /// Final state
    pub state: LauncherState,
    /// Every state entered, oldest first
    pub history: Vec<LauncherState>,
}

impl LaunchOutcome {
    /// Returns true if `state` was entered during the run
    #[must_use]
    pub fn visited(&self, state: LauncherState) -> bool {
        self.history.contains(&state)
    }
}

/// Acquires and relaunches the build tool
pub struct Launcher {
    config: BootstrapConfig,
    context: BuildContext,
    supervisor: ProcessSupervisor,
    source: Option<Arc<dyn BuildToolSource>>,
    cwd: PathBuf,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("config", &self.config)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl Launcher {
    /// Creates a launcher working from `cwd`
    pub fn new(config: BootstrapConfig, context: BuildContext, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            context,
            supervisor: ProcessSupervisor::new(),
            source: None,
            cwd: cwd.into(),
            timeout: None,
        }
    }

    /// Replaces the process supervisor
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: ProcessSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Uses `source` instead of the configured cache or download command
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn BuildToolSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the build tool deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Deadline for the build tool: explicit, then context, then configuration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
            .or_else(|| self.context_number(BOOTSTRAPPER_TIMEOUT_SECONDS).map(Duration::from_secs))
            .unwrap_or_else(|| self.config.timeout())
    }

    /// Pause after completion, never longer than [`MAX_EXIT_DELAY`]
    #[must_use]
    pub fn exit_delay(&self) -> Duration {
        self.context_number(BOOTSTRAPPER_EXIT_DELAY_MS)
            .map_or_else(|| self.config.exit_delay(), Duration::from_millis)
            .min(MAX_EXIT_DELAY)
    }

    fn context_number(&self, key: &str) -> Option<u64> {
        let value = self.context.get(key)?;
        match value.trim().parse() {
            Ok(number) => Some(number),
            Err(_) => {
                tracing::warn!(key, value = %value, "Ignoring non-numeric context value");
                None
            }
        }
    }

    /// Runs the launcher to a terminal state
    ///
    /// Errors never escape: they are logged and turn into `FAILURE`.
    pub async fn run(&self, options: &BootstrapOptions, cancel: &CancellationToken) -> LaunchOutcome {
        let mut machine = StateMachine::new();

        let exit_code = match self.drive(options, cancel, &mut machine).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(
                    kind = %e.kind(),
                    state = %machine.current(),
                    error = %e,
                    "Bootstrap failed"
                );
                machine.advance(LauncherState::Failed);
                ExitCode::FAILURE
            }
        };

        self.pause_before_exit(cancel).await;

        tracing::info!(exit_code = %exit_code, state = %machine.current(), "Bootstrap finished");
        LaunchOutcome {
            exit_code,
            state: machine.current(),
            history: machine.history().to_vec(),
        }
    }

    async fn drive(
        &self,
        options: &BootstrapOptions,
        cancel: &CancellationToken,
        machine: &mut StateMachine,
    ) -> Result<ExitCode> {
        machine.advance(LauncherState::ResolveBaseDirectory);
        let base_dir = resolve_base_directory(options.base_dir.as_deref(), &self.cwd)?;

        machine.advance(LauncherState::AcquireBuildTool);
        if let Some(exe) = &options.explicit_exe_path {
            let exe = explicit_executable(exe, &base_dir)?;
            tracing::info!(exe = %exe.display(), "Using explicit build tool executable");
            if options.download_only {
                tracing::info!("Download only requested with an explicit executable, nothing to do");
                machine.advance(LauncherState::Done);
                return Ok(ExitCode::SUCCESS);
            }
            return self.invoke(&exe, &base_dir, options, cancel, machine).await;
        }

        let package = self.acquire(options, &base_dir, cancel).await?;
        if options.download_only {
            tracing::info!(
                version = %package.version,
                path = %package.directory.display(),
                "Download only, not launching the build tool"
            );
            machine.advance(LauncherState::Done);
            return Ok(ExitCode::SUCCESS);
        }

        // the clone must outlive the build tool run
        let clone = if self.directory_clone_enabled() {
            let workspace = TempWorkspace::in_system_temp("arbor-tool")?;
            copy_dir(&package.directory, workspace.path())?;
            tracing::debug!(path = %workspace.path().display(), "Cloned build tool package");
            Some(workspace)
        } else {
            None
        };
        let package_root = clone
            .as_ref()
            .map_or(package.directory.as_path(), TempWorkspace::path);

        let entry_point = locate_entry_point(package_root, &self.config.entry_names)?;
        self.invoke(&entry_point, &base_dir, options, cancel, machine)
            .await
    }

    fn directory_clone_enabled(&self) -> bool {
        self.context
            .get_bool(DIRECTORY_CLONE_ENABLED)
            .unwrap_or(self.config.directory_clone)
    }

    fn selector(&self, options: &BootstrapOptions) -> Result<VersionSelector> {
        let requested = options
            .version
            .clone()
            .or_else(|| self.config.version.clone())
            .or_else(|| self.context.get(BOOTSTRAPPER_VERSION))
            .filter(|v| !v.trim().is_empty());

        match requested {
            Some(version) => Ok(VersionSelector::Explicit(version.parse::<PackageVersion>()?)),
            None => Ok(VersionSelector::Latest),
        }
    }

    fn source_for(&self, base_dir: &Path) -> Result<Arc<dyn BuildToolSource>> {
        if let Some(source) = &self.source {
            return Ok(Arc::clone(source));
        }

        let cache_root = self
            .context
            .get(PACKAGE_CACHE)
            .map(PathBuf::from)
            .map_or_else(|| self.config.package_cache_in(base_dir), |p| base_dir.join(p));
        let cache = PackageCache::new(cache_root);

        match self.config.download_argv()? {
            Some(template) => Ok(Arc::new(
                CommandSource::new(cache, template, self.supervisor.clone())?
                    .with_timeout(self.config.download_timeout()),
            )),
            None => Ok(Arc::new(cache)),
        }
    }

    async fn acquire(
        &self,
        options: &BootstrapOptions,
        base_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<AcquiredPackage> {
        let selector = self.selector(options)?;
        let prerelease_allowed = options
            .prerelease_allowed
            .or_else(|| self.context.get_bool(PRERELEASE_ALLOWED))
            .unwrap_or(false);
        let source = self.source_for(base_dir)?;

        tracing::info!(
            source = source.name(),
            selector = %selector,
            prerelease_allowed,
            "Acquiring build tool"
        );

        let package = match source.acquire(&selector, prerelease_allowed, cancel).await {
            Ok(package) => package,
            Err(e) => {
                tracing::warn!(
                    selector = %selector,
                    error = %e,
                    "Build tool acquisition failed, retrying with latest downloaded version"
                );
                source
                    .acquire(&VersionSelector::LatestDownloaded, prerelease_allowed, cancel)
                    .await?
            }
        };

        tracing::info!(
            version = %package.version,
            path = %package.directory.display(),
            "Acquired build tool"
        );
        Ok(package)
    }

    async fn invoke(
        &self,
        entry_point: &Path,
        base_dir: &Path,
        options: &BootstrapOptions,
        cancel: &CancellationToken,
        machine: &mut StateMachine,
    ) -> Result<ExitCode> {
        machine.advance(LauncherState::InvokeBuildTool);

        let build_dir = options
            .build_directory
            .as_ref()
            .map_or_else(|| base_dir.join("build"), |dir| base_dir.join(dir));

        let mut args = self.config.entry_args.clone();
        args.extend(options.args.iter().cloned());
        args.push(format!("{BASE_DIRECTORY_FLAG}={}", base_dir.display()));
        args.push(format!("{BUILD_DIRECTORY_FLAG}={}", build_dir.display()));
        if let Some(branch) = &options.branch_name_override {
            args.push(format!("{BRANCH_NAME_FLAG}={branch}"));
        }

        let invocation = ProcessInvocation::new(entry_point)
            .args(args)
            .envs(self.context.snapshot())
            .env(SOURCE_ROOT, base_dir.display().to_string())
            .env(BUILD_DIRECTORY, build_dir.display().to_string())
            .working_dir(base_dir);

        let timeout = self.timeout();
        let deadline = Deadline::after(cancel, timeout);
        let supervisor = self
            .supervisor
            .clone()
            .with_tree_kill(self.config.kill_tree_on_timeout);

        tracing::info!(
            command = %invocation.display(),
            timeout_secs = timeout.as_secs_f64(),
            "Launching build tool"
        );
        let outcome = supervisor
            .run_detailed(
                &invocation,
                deadline.token(),
                Some(forward_output(false)),
                Some(forward_output(true)),
            )
            .await?;

        if outcome.exit_code.is_failure() && deadline.expired() {
            machine.advance(LauncherState::ProcessTreeKill);
            tracing::error!(
                error = ?outcome.supervision_error(entry_point),
                pid = ?outcome.pid,
                timeout_secs = timeout.as_secs_f64(),
                tree_kill = self.config.kill_tree_on_timeout,
                "Build tool exceeded its deadline"
            );
            machine.advance(LauncherState::Failed);
            return Ok(ExitCode::FAILURE);
        }

        if let Some(err) = outcome.supervision_error(entry_point) {
            return Err(err);
        }

        if outcome.exit_code.is_success() {
            machine.advance(LauncherState::Done);
        } else {
            tracing::error!(
                failure = ?outcome.failure,
                raw_exit_code = ?outcome.raw_exit_code,
                duration_ms = outcome.duration.as_millis(),
                "Build tool failed"
            );
            machine.advance(LauncherState::Failed);
        }
        Ok(outcome.exit_code)
    }

    async fn pause_before_exit(&self, cancel: &CancellationToken) {
        let delay = self.exit_delay();
        if delay.is_zero() {
            return;
        }
        tracing::debug!(delay_ms = delay.as_millis(), "Waiting before exit");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {
                tracing::debug!("Exit delay cancelled");
            }
        }
    }
}

fn explicit_executable(exe: &Path, base_dir: &Path) -> Result<PathBuf> {
    let exe = if exe.is_absolute() {
        exe.to_path_buf()
    } else {
        base_dir.join(exe)
    };
    if exe.is_file() {
        Ok(exe)
    } else {
        Err(ArborError::ExecutableNotFound { path: exe })
    }
}

fn forward_output(stderr: bool) -> LineCallback {
    Arc::new(move |line: &str| {
        if stderr {
            tracing::warn!(target: "arbor::build_tool", "{line}");
        } else {
            tracing::info!(target: "arbor::build_tool", "{line}");
        }
    })
}
