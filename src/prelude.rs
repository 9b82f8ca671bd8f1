//! Prelude module for common imports

pub use crate::errors::{ArborError, ErrorKind, ProcessFailureKind, Result};

// Process supervision
pub use crate::executor::{
    Deadline, ExitCode, ProcessInvocation, ProcessSupervisor, ProcessTreeKiller,
};

// Variables
pub use crate::variables::{
    BuildContext, ProviderRegistry, Variable, VariableProvider, VariableResolver, VariableSet,
};

// Pipeline
pub use crate::pipeline::{PipelineReport, Tool, ToolPipeline, ToolRegistry, ToolResult};

// Bootstrap
pub use crate::bootstrap::{BootstrapOptions, LaunchOutcome, Launcher, LauncherState};
