//! `arbor bootstrap` - Acquire the build tool and relaunch it
//!
//! ## Usage
//!
//! ```bash
//! arbor bootstrap -baseDirectory=. -buildToolVersion=1.4.0 --verbose
//! arbor bootstrap --download-only
//! ```

use arbor::ExitCode;
use arbor::bootstrap::{BootstrapOptions, Launcher};
use arbor::infrastructure::Config;
use arbor::variables::BuildContext;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Runs the launcher to completion
///
/// Never fails: invalid arguments are logged and reported as `FAILURE`.
pub async fn run_bootstrap(
    config: &Config,
    args: &[String],
    cwd: &Path,
    cancel: &CancellationToken,
) -> ExitCode {
    let context = BuildContext::from_process_env();
    let options = match BootstrapOptions::from_args_or_debug(args, &context) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!(kind = %e.kind(), error = %e, "Invalid bootstrap arguments");
            return ExitCode::FAILURE;
        }
    };

    let outcome = Launcher::new(config.bootstrap.clone(), context, cwd)
        .run(&options, cancel)
        .await;
    tracing::debug!(history = ?outcome.history, "Launcher history");
    outcome.exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_arguments_fail() {
        let code = run_bootstrap(
            &Config::default(),
            &["-prerelease=maybe".to_string()],
            Path::new("."),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(code, ExitCode::FAILURE);
    }
}
