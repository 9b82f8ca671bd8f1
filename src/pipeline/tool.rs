//! Tool contract and discovery-time binding

use super::tail::TailBuffer;
use crate::errors::Result;
use crate::executor::ExitCode;
use crate::variables::VariableSet;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A build step run by the pipeline
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name shown in logs and the results table
    fn name(&self) -> &str;

    /// Position in the run order, ascending
    fn priority(&self) -> i32;

    /// Runs even after an earlier tool failed (cleanup and reporting)
    fn run_always(&self) -> bool {
        false
    }

    /// Executes the step against the resolved variables
    ///
    /// # Errors
    ///
    /// An error marks the tool as failed; the pipeline keeps going.
    async fn execute(&self, variables: &VariableSet, cancel: &CancellationToken) -> Result<ExitCode>;

    /// Recent output, emitted by the pipeline when the tool fails
    fn log_tail(&self) -> Option<&TailBuffer> {
        None
    }
}

/// A tool bound to the priority and flags it declared when registered
#[derive(Clone)]
pub struct ToolInvocation {
    tool: Arc<dyn Tool>,
    name: String,
    priority: i32,
    run_always: bool,
    index: usize,
}

impl ToolInvocation {
    /// Binds a tool, reading its declarations once
    #[must_use]
    pub fn new(tool: Arc<dyn Tool>, index: usize) -> Self {
        Self {
            name: tool.name().to_string(),
            priority: tool.priority(),
            run_always: tool.run_always(),
            tool,
            index,
        }
    }

    /// The bound tool
    #[must_use]
    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    /// Tool name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared priority
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Declared run-always flag
    #[must_use]
    pub fn run_always(&self) -> bool {
        self.run_always
    }

    /// Registration order
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolInvocation")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("run_always", &self.run_always)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
