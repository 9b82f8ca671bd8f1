//! Command line interface for arbor
//!
//! - `bootstrap`: acquire the build tool and relaunch it under a deadline
//! - `build`: resolve variables and run the configured tools
//! - `variables`: list well-known variables or the resolved set
//! - `completions`: generate shell completions

pub mod bootstrap;
pub mod build;
pub mod completions;
pub mod variables;

use anyhow::{Context, Result};
use arbor::ExitCode;
use arbor::infrastructure::{Config, init_logging};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// CLI arguments for arbor
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to arbor.yaml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire the build tool and run it with the given arguments
    Bootstrap {
        /// Arguments, `-name=value` options are interpreted, the rest passed through
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Resolve build variables and run the configured tools
    Build {
        /// Arguments, `-name=value` options are interpreted, the rest ignored
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List well-known variables
    Variables {
        /// Print the resolved variable set instead
        #[arg(long)]
        resolved: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Arguments used when resolving
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Output format of listing commands
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text
    Text,
    /// JSON document
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Exit code for a command line that did not parse
///
/// Help and version requests succeed, everything else is a failure.
fn usage_exit_code(kind: clap::error::ErrorKind) -> ExitCode {
    use clap::error::ErrorKind;

    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Parse and execute CLI arguments
pub fn run() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().context("Failed to print usage")?;
            return Ok(usage_exit_code(e.kind()));
        }
    };

    if let Command::Completions { shell, output } = &args.command {
        use clap_complete::Shell;

        let shell = match shell {
            ShellArg::Bash => Shell::Bash,
            ShellArg::Zsh => Shell::Zsh,
            ShellArg::Fish => Shell::Fish,
            ShellArg::PowerShell => Shell::PowerShell,
            ShellArg::Elvish => Shell::Elvish,
        };
        let completions = completions::generate_completions(shell)?;
        if let Some(output_path) = output {
            completions::save_completions(&completions, output_path)?;
        } else {
            println!("{completions}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let mut config = Config::load(args.config.as_deref(), &cwd)?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    init_logging(&config.log_level, config.json_logs || args.json_logs);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime.block_on(dispatch(args.command, config, cwd))
}

async fn dispatch(command: Command, config: Config, cwd: PathBuf) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match command {
        Command::Bootstrap { args } => {
            Ok(bootstrap::run_bootstrap(&config, &args, &cwd, &cancel).await)
        }
        Command::Build { args } => build::run_build(&config, &args, &cwd, &cancel).await,
        Command::Variables {
            resolved,
            format,
            args,
        } => {
            let output = if resolved {
                variables::render_resolved(&config, &args, &cwd, format, &cancel).await?
            } else {
                variables::render_well_known(format)?
            };
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_pass_through_arguments() {
        let args = Args::try_parse_from([
            "arbor",
            "--log-level",
            "debug",
            "bootstrap",
            "-buildDirectory=out",
            "--download-only",
            "extra",
        ])
        .unwrap();

        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Command::Bootstrap { args } => {
                assert_eq!(args, vec!["-buildDirectory=out", "--download-only", "extra"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_usage_errors_exit_with_failure() {
        let err = Args::try_parse_from(["arbor", "--bogus"]).unwrap_err();
        assert_eq!(usage_exit_code(err.kind()), ExitCode::FAILURE);

        let err = Args::try_parse_from(["arbor"]).unwrap_err();
        assert_eq!(usage_exit_code(err.kind()), ExitCode::FAILURE);

        let err = Args::try_parse_from(["arbor", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(err.kind()), ExitCode::SUCCESS);

        let err = Args::try_parse_from(["arbor", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(err.kind()), ExitCode::SUCCESS);
    }

    #[test]
    fn test_relaunch_arguments_parse_as_build() {
        let args = Args::try_parse_from([
            "arbor",
            "build",
            "--verbose",
            "-baseDirectory=/src",
            "-buildDirectory=/src/build",
        ])
        .unwrap();
        match args.command {
            Command::Build { args } => {
                assert_eq!(
                    args,
                    vec!["--verbose", "-baseDirectory=/src", "-buildDirectory=/src/build"]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_variables_flags() {
        let args = Args::try_parse_from(["arbor", "variables", "--resolved", "-f", "json"]).unwrap();
        match args.command {
            Command::Variables {
                resolved, format, ..
            } => {
                assert!(resolved);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
