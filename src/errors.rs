//! Error types for the orchestration engine
//!
//! Every variant maps onto one [`ErrorKind`], the coarse taxonomy used for
//! logging. Whether a failure ends the run is decided by the caller.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ArborError>;

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or ambiguous executable, missing required variable, bad config
    Configuration,
    /// A variable provider failed
    Provider,
    /// A tool returned non-zero or raised an error
    ToolExecution,
    /// Spawn failure, timeout kill or a race detected after exit
    ProcessSupervision,
    /// The build tool distributable could not be resolved
    BootstrapAcquisition,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "ConfigurationError"),
            Self::Provider => write!(f, "ProviderError"),
            Self::ToolExecution => write!(f, "ToolExecutionError"),
            Self::ProcessSupervision => write!(f, "ProcessSupervisionError"),
            Self::BootstrapAcquisition => write!(f, "BootstrapAcquisitionError"),
        }
    }
}

/// How a supervised process failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessFailureKind {
    /// The OS refused to start the process
    SpawnFailure,
    /// Cancellation fired before the process exited
    Timeout,
    /// The process exited with a non-zero code
    AbnormalExit,
    /// The process was still alive after its exit was reported
    RaceDetected,
    /// The real exit code could not be read
    ExitCodeUnavailable,
}

impl fmt::Display for ProcessFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailure => write!(f, "spawn failure"),
            Self::Timeout => write!(f, "timeout"),
            Self::AbnormalExit => write!(f, "abnormal exit"),
            Self::RaceDetected => write!(f, "race detected"),
            Self::ExitCodeUnavailable => write!(f, "exit code unavailable"),
        }
    }
}

/// Errors that can occur while orchestrating a build
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArborError {
    /// The executable to launch does not exist
    #[error("Executable not found: {}", path.display())]
    ExecutableNotFound {
        /// Path or bare name that was looked up.
        path: PathBuf,
    },

    /// Zero or several entry point candidates in a package
    #[error("Expected exactly one entry point under {}, found {}: {candidates:?}", root.display(), candidates.len())]
    EntryPointCandidates {
        /// Directory that was searched.
        root: PathBuf,
        /// Every candidate that matched.
        candidates: Vec<PathBuf>,
    },

    /// A variable required by the caller was not resolved
    #[error("Required variable '{key}' is not defined")]
    MissingVariable {
        /// Key that was requested.
        key: String,
    },

    /// Invalid configuration value or file
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A variable file could not be read or parsed
    #[error("Variable file {} is invalid: {reason}", path.display())]
    VariableFile {
        /// File that failed to load.
        path: PathBuf,
        /// Why it failed.
        reason: String,
    },

    /// A provider failed while resolving variables
    #[error("Variable provider '{provider}' failed: {reason}")]
    Provider {
        /// Name of the provider.
        provider: String,
        /// Error message describing the failure.
        reason: String,
    },

    /// A tool raised an error during execution
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecution {
        /// Name of the tool.
        tool: String,
        /// Error message describing the failure.
        reason: String,
    },

    /// A supervised process failed
    #[error("Process '{}' failed ({kind}): {detail}", executable.display())]
    ProcessSupervision {
        /// Executable that was supervised.
        executable: PathBuf,
        /// Failure classification.
        kind: ProcessFailureKind,
        /// Human readable detail.
        detail: String,
    },

    /// The build tool distributable could not be resolved
    #[error("Could not acquire build tool ({selector}): {reason}")]
    BootstrapAcquisition {
        /// Version selector that was requested.
        selector: String,
        /// Why the acquisition failed.
        reason: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),
}

impl ArborError {
    /// Returns the taxonomy kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExecutableNotFound { .. }
            | Self::EntryPointCandidates { .. }
            | Self::MissingVariable { .. }
            | Self::InvalidConfiguration(_)
            | Self::VariableFile { .. }
            | Self::Io(_) => ErrorKind::Configuration,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::ProcessSupervision { .. } => ErrorKind::ProcessSupervision,
            Self::BootstrapAcquisition { .. } => ErrorKind::BootstrapAcquisition,
        }
    }

    /// Wraps any error as a provider failure
    pub fn provider(provider: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for ArborError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
