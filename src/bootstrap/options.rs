//! Bootstrap command line options
//!
//! The bootstrapper consumes a handful of `-name=value` options and passes
//! everything else through to the relaunched build process untouched.

use crate::errors::{ArborError, Result};
use crate::variables::BuildContext;
use crate::variables::parse_bool;
use crate::variables::well_known::BOOTSTRAPPER_DEBUG;
use std::path::PathBuf;

/// Flag selecting the build output directory
pub const BUILD_DIRECTORY_FLAG: &str = "-buildDirectory";

/// Flag stopping after the build tool is acquired
pub const DOWNLOAD_ONLY_FLAG: &str = "--download-only";

/// Flag naming an already available build tool executable
pub const BUILD_EXE_FLAG: &str = "-arborBuildExe";

/// Flag selecting the base directory
pub const BASE_DIRECTORY_FLAG: &str = "-baseDirectory";

/// Flag allowing prerelease build tool versions
pub const PRERELEASE_FLAG: &str = "-prerelease";

/// Flag overriding the branch name
pub const BRANCH_NAME_FLAG: &str = "-branchName";

/// Flag selecting an explicit build tool version
pub const VERSION_FLAG: &str = "-buildToolVersion";

/// Parsed bootstrap options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Arguments passed through to the build process
    pub args: Vec<String>,

    /// Explicit base directory
    pub base_dir: Option<PathBuf>,

    /// Explicit build output directory
    pub build_directory: Option<PathBuf>,

    /// Whether prerelease versions may be selected
    pub prerelease_allowed: Option<bool>,

    /// Branch name to use instead of asking version control
    pub branch_name_override: Option<String>,

    /// Stop after acquiring the build tool
    pub download_only: bool,

    /// Build tool executable to launch directly
    pub explicit_exe_path: Option<PathBuf>,

    /// Build tool version to acquire
    pub version: Option<String>,
}

fn split_option(arg: &str) -> Option<(&str, &str)> {
    let (name, value) = arg.split_once('=')?;
    name.starts_with('-').then_some((name, value))
}

fn non_empty(name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ArborError::InvalidConfiguration(format!(
            "option {name} requires a value"
        )));
    }
    Ok(value.to_string())
}

impl BootstrapOptions {
    /// Parses command line arguments
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] for a recognised option
    /// with an empty or malformed value.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for arg in args {
            let arg = arg.as_ref();

            if arg.eq_ignore_ascii_case(DOWNLOAD_ONLY_FLAG) {
                options.download_only = true;
                continue;
            }

            let Some((name, value)) = split_option(arg) else {
                options.args.push(arg.to_string());
                continue;
            };

            if name.eq_ignore_ascii_case(BUILD_DIRECTORY_FLAG) {
                options.build_directory = Some(PathBuf::from(non_empty(name, value)?));
            } else if name.eq_ignore_ascii_case(BUILD_EXE_FLAG) {
                options.explicit_exe_path = Some(PathBuf::from(non_empty(name, value)?));
            } else if name.eq_ignore_ascii_case(BASE_DIRECTORY_FLAG) {
                options.base_dir = Some(PathBuf::from(non_empty(name, value)?));
            } else if name.eq_ignore_ascii_case(PRERELEASE_FLAG) {
                let allowed = parse_bool(value).ok_or_else(|| {
                    ArborError::InvalidConfiguration(format!(
                        "option {name} expects true or false, got '{value}'"
                    ))
                })?;
                options.prerelease_allowed = Some(allowed);
            } else if name.eq_ignore_ascii_case(BRANCH_NAME_FLAG) {
                options.branch_name_override = Some(non_empty(name, value)?);
            } else if name.eq_ignore_ascii_case(VERSION_FLAG) {
                options.version = Some(non_empty(name, value)?);
            } else {
                options.args.push(arg.to_string());
            }
        }

        Ok(options)
    }

    /// Parses arguments, or uses [`BootstrapOptions::debug`] when there are
    /// none and the context enables the debug override
    ///
    /// # Errors
    ///
    /// Same as [`BootstrapOptions::parse`].
    pub fn from_args_or_debug(args: &[String], context: &BuildContext) -> Result<Self> {
        if args.is_empty() && context.get_bool(BOOTSTRAPPER_DEBUG) == Some(true) {
            tracing::info!("No arguments and debug override enabled, using debug options");
            return Ok(Self::debug());
        }
        Self::parse(args)
    }

    /// Fixed options used for local debugging of the bootstrapper
    #[must_use]
    pub fn debug() -> Self {
        Self {
            args: Vec::new(),
            base_dir: None,
            build_directory: None,
            prerelease_allowed: Some(true),
            branch_name_override: Some("develop".to_string()),
            download_only: false,
            explicit_exe_path: None,
            version: None,
        }
    }
}
