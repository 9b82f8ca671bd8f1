//! Configuration management
//!
//! Configuration is read from `arbor.yaml` (or an explicit path) once at
//! startup. A few settings can be overridden through environment variables.

use crate::errors::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for the post-run exit delay
pub const MAX_EXIT_DELAY: Duration = Duration::from_secs(30);

/// Environment override for the log level
pub const ENV_LOG_LEVEL: &str = "ARBOR_LOG_LEVEL";

/// Environment override for the bootstrap deadline
pub const ENV_BOOTSTRAP_TIMEOUT: &str = "ARBOR_BOOTSTRAP_TIMEOUT_SECS";

/// Environment override for the exit delay
pub const ENV_EXIT_DELAY: &str = "ARBOR_EXIT_DELAY_MS";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level
    pub log_level: String,
    /// Emit JSON logs
    pub json_logs: bool,
    /// Bootstrap launcher settings
    pub bootstrap: BootstrapConfig,
    /// Build pipeline settings
    pub build: BuildConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            bootstrap: BootstrapConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

/// Bootstrap launcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Deadline for the relaunched build process, in seconds
    pub timeout_secs: u64,
    /// Pause after completion, in milliseconds
    pub exit_delay_ms: u64,
    /// Kill the whole process tree when the deadline expires
    pub kill_tree_on_timeout: bool,
    /// Package cache, relative to the base directory unless absolute
    pub package_cache: PathBuf,
    /// Download command template with `{version}` and `{output}` placeholders
    pub download_command: Option<String>,
    /// Deadline for the download command, in seconds
    pub download_timeout_secs: u64,
    /// Explicit build tool version
    pub version: Option<String>,
    /// File names accepted as the build tool entry point
    pub entry_names: Vec<String>,
    /// Arguments placed before everything else when launching the entry point
    pub entry_args: Vec<String>,
    /// Copy the package to a private directory before launching it
    pub directory_clone: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            exit_delay_ms: 0,
            kill_tree_on_timeout: true,
            package_cache: PathBuf::from(".arbor/packages"),
            download_command: None,
            download_timeout_secs: 300,
            version: None,
            entry_names: vec!["arbor".to_string(), "arbor.exe".to_string()],
            entry_args: vec!["build".to_string()],
            directory_clone: false,
        }
    }
}

impl BootstrapConfig {
    /// Deadline for the build process
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Exit delay, clamped to [`MAX_EXIT_DELAY`]
    #[must_use]
    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms).min(MAX_EXIT_DELAY)
    }

    /// Deadline for the download command
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Package cache resolved against `base_dir`
    #[must_use]
    pub fn package_cache_in(&self, base_dir: &Path) -> PathBuf {
        if self.package_cache.is_absolute() {
            self.package_cache.clone()
        } else {
            base_dir.join(&self.package_cache)
        }
    }

    /// Download command split into arguments
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] for unbalanced quotes.
    pub fn download_argv(&self) -> Result<Option<Vec<String>>> {
        self.download_command
            .as_deref()
            .map(|command| {
                shell_words::split(command).map_err(|e| {
                    ArborError::InvalidConfiguration(format!("bootstrap.download_command: {e}"))
                })
            })
            .transpose()
    }
}

/// Build pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Timeout for quick version control queries, in seconds
    pub vcs_timeout_secs: u64,
    /// Fail when the branch name cannot be determined
    pub require_branch: bool,
    /// Fixed variables, applied after the built-in providers
    pub variables: BTreeMap<String, String>,
    /// Tools to run
    pub tools: Vec<ToolConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            vcs_timeout_secs: 5,
            require_branch: false,
            variables: BTreeMap::new(),
            tools: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Timeout for version control queries
    #[must_use]
    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_secs(self.vcs_timeout_secs)
    }
}

fn default_tail_capacity() -> usize {
    100
}

/// One command-line tool of the build pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool name
    pub name: String,
    /// Position in the run order
    #[serde(default)]
    pub priority: i32,
    /// Run even after an earlier failure
    #[serde(default)]
    pub run_always: bool,
    /// Command line, split with shell quoting rules
    pub command: String,
    /// Working directory (defaults to the source root)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Output lines kept for failure diagnostics
    #[serde(default = "default_tail_capacity")]
    pub tail_capacity: usize,
}

impl Config {
    /// File looked up in the working directory
    pub const DEFAULT_FILE: &'static str = "arbor.yaml";

    /// Parses YAML configuration
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] for malformed YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ArborError::InvalidConfiguration(e.to_string()))
    }

    /// Loads configuration from `path`, or `arbor.yaml` in `cwd` if present
    ///
    /// Environment overrides are applied and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] when an explicit file is
    /// missing or any file or override is invalid.
    pub fn load(path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ArborError::InvalidConfiguration(format!("{}: {e}", path.display()))
                })?;
                Self::from_yaml_str(&content)?
            }
            None => {
                let default_path = cwd.join(Self::DEFAULT_FILE);
                if default_path.is_file() {
                    Self::from_yaml_str(&std::fs::read_to_string(&default_path)?)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides through `lookup`
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] for non-numeric values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, value: String| {
            value.trim().parse::<u64>().map_err(|_| {
                ArborError::InvalidConfiguration(format!("{key} must be a number, got '{value}'"))
            })
        };

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(value) = lookup(ENV_BOOTSTRAP_TIMEOUT) {
            self.bootstrap.timeout_secs = number(ENV_BOOTSTRAP_TIMEOUT, value)?;
        }
        if let Some(value) = lookup(ENV_EXIT_DELAY) {
            self.bootstrap.exit_delay_ms = number(ENV_EXIT_DELAY, value)?;
        }
        Ok(())
    }

    /// Checks invariants serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap.timeout_secs == 0 {
            return Err(ArborError::InvalidConfiguration(
                "bootstrap.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.bootstrap.entry_names.is_empty() {
            return Err(ArborError::InvalidConfiguration(
                "bootstrap.entry_names must not be empty".to_string(),
            ));
        }
        self.bootstrap.download_argv()?;

        let mut names = HashSet::new();
        for tool in &self.build.tools {
            if tool.name.trim().is_empty() {
                return Err(ArborError::InvalidConfiguration(
                    "tool name must not be empty".to_string(),
                ));
            }
            if tool.command.trim().is_empty() {
                return Err(ArborError::InvalidConfiguration(format!(
                    "tool '{}' has an empty command",
                    tool.name
                )));
            }
            if !names.insert(tool.name.to_lowercase()) {
                return Err(ArborError::InvalidConfiguration(format!(
                    "tool '{}' is defined twice",
                    tool.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bootstrap.timeout(), Duration::from_secs(600));
        assert_eq!(config.bootstrap.entry_names, vec!["arbor", "arbor.exe"]);
        assert_eq!(config.bootstrap.entry_args, vec!["build"]);
        assert_eq!(config.build.vcs_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::from_yaml_str(
            r"
log_level: debug
bootstrap:
  timeout_secs: 30
  download_command: fetch-arbor --version {version} --out '{output}'
build:
  variables:
    Arbor.Build.Configuration: Release
  tools:
    - name: compile
      priority: 100
      command: make all
    - name: cleanup
      priority: 900
      run_always: true
      command: make clean
      tail_capacity: 20
",
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.bootstrap.timeout_secs, 30);
        assert!(config.bootstrap.kill_tree_on_timeout);
        assert_eq!(
            config.bootstrap.download_argv().unwrap().unwrap(),
            vec!["fetch-arbor", "--version", "{version}", "--out", "{output}"]
        );
        assert_eq!(config.build.tools.len(), 2);
        assert_eq!(config.build.tools[0].tail_capacity, 100);
        assert!(config.build.tools[1].run_always);
        assert_eq!(
            config.build.variables.get("Arbor.Build.Configuration"),
            Some(&"Release".to_string())
        );
    }

    #[test]
    fn test_exit_delay_is_clamped() {
        let config = BootstrapConfig {
            exit_delay_ms: 120_000,
            ..BootstrapConfig::default()
        };
        assert_eq!(config.exit_delay(), MAX_EXIT_DELAY);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                ENV_LOG_LEVEL => Some("trace".to_string()),
                ENV_BOOTSTRAP_TIMEOUT => Some("45".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.bootstrap.timeout_secs, 45);
        assert_eq!(config.bootstrap.exit_delay_ms, 0);

        let err = config.apply_overrides(|key| (key == ENV_EXIT_DELAY).then(|| "soon".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.build.tools = vec![
            ToolConfig {
                name: "a".to_string(),
                priority: 0,
                run_always: false,
                command: "true".to_string(),
                working_dir: None,
                tail_capacity: 10,
            };
            2
        ];
        assert!(config.validate().is_err());

        config.build.tools.truncate(1);
        assert!(config.validate().is_ok());

        config.bootstrap.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_directory_and_path() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            Config::load(None, dir.path()).unwrap().bootstrap,
            BootstrapConfig::default()
        );

        std::fs::write(dir.path().join(Config::DEFAULT_FILE), "json_logs: true\n").unwrap();
        assert!(Config::load(None, dir.path()).unwrap().json_logs);

        let missing = dir.path().join("other.yaml");
        assert!(Config::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_package_cache_resolution() {
        let config = BootstrapConfig::default();
        assert_eq!(
            config.package_cache_in(Path::new("/src")),
            PathBuf::from("/src/.arbor/packages")
        );
    }
}
