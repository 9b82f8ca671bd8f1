//! Generic tool running one external command

use super::tail::TailBuffer;
use super::tool::Tool;
use crate::errors::{ArborError, Result};
use crate::executor::{ExitCode, LineCallback, ProcessInvocation, ProcessSupervisor};
use crate::infrastructure::ToolConfig;
use crate::variables::VariableSet;
use crate::variables::well_known::SOURCE_ROOT;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a configured command line through the process supervisor
///
/// `${key}` references in the arguments are replaced with resolved values
/// before launch. Resolved variables are also exported to the child environment under their own
/// key and under an upper-case, underscore-separated alias
/// (`Arbor.Build.Directory` also becomes `ARBOR_BUILD_DIRECTORY`). Output
/// lines are logged and kept in a [`TailBuffer`].
#[derive(Debug)]
pub struct CommandTool {
    name: String,
    priority: i32,
    run_always: bool,
    argv: Vec<String>,
    working_dir: Option<PathBuf>,
    supervisor: ProcessSupervisor,
    tail: Arc<TailBuffer>,
}

impl CommandTool {
    /// Creates a tool for an already split argument vector
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] when `argv` is empty
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        argv: Vec<String>,
        supervisor: ProcessSupervisor,
    ) -> Result<Self> {
        let name = name.into();
        if argv.is_empty() {
            return Err(ArborError::InvalidConfiguration(format!(
                "tool '{name}' has an empty command"
            )));
        }
        Ok(Self {
            name,
            priority,
            run_always: false,
            argv,
            working_dir: None,
            supervisor,
            tail: Arc::new(TailBuffer::default()),
        })
    }

    /// Creates a tool from its configuration entry
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] when the command line
    /// cannot be split or is empty
    pub fn from_config(config: &ToolConfig, supervisor: ProcessSupervisor) -> Result<Self> {
        let argv = shell_words::split(&config.command).map_err(|e| {
            ArborError::InvalidConfiguration(format!("tool '{}' command: {e}", config.name))
        })?;

        let mut tool = Self::new(&config.name, config.priority, argv, supervisor)?
            .with_run_always(config.run_always)
            .with_tail_capacity(config.tail_capacity);
        tool.working_dir.clone_from(&config.working_dir);
        Ok(tool)
    }

    /// Sets the run-always flag
    #[must_use]
    pub fn with_run_always(mut self, run_always: bool) -> Self {
        self.run_always = run_always;
        self
    }

    /// Sets how many output lines are kept
    #[must_use]
    pub fn with_tail_capacity(mut self, capacity: usize) -> Self {
        self.tail = Arc::new(TailBuffer::new(capacity));
        self
    }

    /// Sets the working directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn line_logger(&self, stderr: bool) -> LineCallback {
        let tail = Arc::clone(&self.tail);
        let name = self.name.clone();
        Arc::new(move |line: &str| {
            if stderr {
                tracing::warn!(tool = %name, "{line}");
            } else {
                tracing::info!(tool = %name, "{line}");
            }
            tail.push(line);
        })
    }
}

/// Converts a variable key to a conventional environment variable name
#[must_use]
pub fn env_alias(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

static VARIABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("variable reference pattern is valid")
});

/// Replaces `${key}` references with values from `variables`
///
/// Keys are matched case-insensitively. Unknown references are kept as is.
///
/// # Example
///
/// ```rust
/// use arbor::pipeline::expand_variables;
/// use arbor::variables::VariableSet;
///
/// let mut variables = VariableSet::new();
/// variables.set("Arbor.Build.Configuration", "Release");
/// assert_eq!(
///     expand_variables("--config=${arbor.build.configuration} ${unknown}", &variables),
///     "--config=Release ${unknown}"
/// );
/// ```
#[must_use]
pub fn expand_variables(input: &str, variables: &VariableSet) -> String {
    VARIABLE_REFERENCE
        .replace_all(input, |caps: &regex::Captures| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            match variables.value(key) {
                Some(value) => value.to_string(),
                None => caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
            }
        })
        .into_owned()
}

fn export_variables(variables: &VariableSet) -> HashMap<String, String> {
    let mut env = variables.to_env_map();
    let aliases: Vec<(String, String)> = env
        .iter()
        .map(|(k, v)| (env_alias(k), v.clone()))
        .collect();
    for (alias, value) in aliases {
        env.entry(alias).or_insert(value);
    }
    env
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn run_always(&self) -> bool {
        self.run_always
    }

    async fn execute(&self, variables: &VariableSet, cancel: &CancellationToken) -> Result<ExitCode> {
        let (program, args) = self.argv.split_first().ok_or_else(|| {
            ArborError::InvalidConfiguration(format!("tool '{}' has an empty command", self.name))
        })?;

        let mut invocation = ProcessInvocation::new(expand_variables(program, variables))
            .args(args.iter().map(|arg| expand_variables(arg, variables)))
            .envs(export_variables(variables));
        let working_dir = self
            .working_dir
            .clone()
            .or_else(|| variables.value(SOURCE_ROOT).map(PathBuf::from));
        if let Some(dir) = working_dir {
            invocation = invocation.working_dir(dir);
        }

        let outcome = self
            .supervisor
            .run_detailed(
                &invocation,
                cancel,
                Some(self.line_logger(false)),
                Some(self.line_logger(true)),
            )
            .await?;

        if let Some(err) = outcome.supervision_error(&invocation.executable) {
            return Err(ArborError::ToolExecution {
                tool: self.name.clone(),
                reason: err.to_string(),
            });
        }

        Ok(match outcome.raw_exit_code {
            Some(code) if outcome.exit_code.is_failure() && code != 0 => ExitCode::new(code),
            _ => outcome.exit_code,
        })
    }

    fn log_tail(&self) -> Option<&TailBuffer> {
        Some(&self.tail)
    }
}
