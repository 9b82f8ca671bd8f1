//! Priority-ordered tool execution
//!
//! Tools run strictly one after another in ascending priority, ties broken by
//! registration order. Once any tool fails, the failure flag stays set for the
//! rest of the run and only `run_always` tools are still executed.

use super::registry::ToolRegistry;
use super::result::{PipelineReport, ToolOutcome, ToolResult};
use super::tool::ToolInvocation;
use crate::executor::ExitCode;
use crate::variables::VariableSet;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sequential runner over a fixed list of tool invocations
#[derive(Debug, Clone, Default)]
pub struct ToolPipeline {
    invocations: Vec<ToolInvocation>,
}

impl ToolPipeline {
    /// Creates a pipeline from the registered tools
    #[must_use]
    pub fn new(registry: &ToolRegistry) -> Self {
        Self {
            invocations: registry.invocations(),
        }
    }

    /// Invocations in execution order
    #[must_use]
    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Runs every tool and returns one result per tool
    pub async fn run_all(&self, variables: &VariableSet, cancel: &CancellationToken) -> PipelineReport {
        let started = Instant::now();
        let mut results = Vec::with_capacity(self.invocations.len());
        let mut failed = false;
        let mut exit_code = ExitCode::SUCCESS;

        tracing::info!(tools = self.invocations.len(), "Starting tool pipeline");

        for invocation in &self.invocations {
            let name = invocation.name();

            if failed && !invocation.run_always() {
                tracing::info!(tool = %name, "Skipping tool after earlier failure");
                results.push(ToolResult::not_run(invocation));
                continue;
            }

            tracing::info!(
                tool = %name,
                priority = invocation.priority(),
                run_always = invocation.run_always(),
                "Running tool"
            );
            let tool_started = Instant::now();
            let execution = AssertUnwindSafe(invocation.tool().execute(variables, cancel))
                .catch_unwind()
                .await;
            let duration = tool_started.elapsed();

            let result = match execution {
                Ok(Ok(code)) if code.is_success() => {
                    tracing::info!(tool = %name, duration_ms = duration.as_millis(), "Tool succeeded");
                    ToolResult::executed(invocation, ToolOutcome::Succeeded, None, duration, Some(code))
                }
                Ok(Ok(code)) => {
                    tracing::error!(tool = %name, exit_code = code.code(), "Tool failed");
                    exit_code = code;
                    ToolResult::executed(
                        invocation,
                        ToolOutcome::Failed,
                        Some(format!("exit code {code}")),
                        duration,
                        Some(code),
                    )
                }
                Ok(Err(e)) => {
                    tracing::error!(tool = %name, kind = %e.kind(), error = %e, "Tool raised an error");
                    exit_code = ExitCode::FAILURE;
                    ToolResult::executed(
                        invocation,
                        ToolOutcome::Failed,
                        Some(e.kind().to_string()),
                        duration,
                        None,
                    )
                }
                Err(panic) => {
                    tracing::error!(tool = %name, panic = %panic_message(panic.as_ref()), "Tool panicked");
                    exit_code = ExitCode::FAILURE;
                    ToolResult::executed(
                        invocation,
                        ToolOutcome::Failed,
                        Some("panic".to_string()),
                        duration,
                        None,
                    )
                }
            };

            if result.outcome.is_failed() {
                failed = true;
                emit_log_tail(invocation);
            }
            results.push(result);
        }

        let report = PipelineReport {
            exit_code: if failed { exit_code } else { ExitCode::SUCCESS },
            results,
        };

        tracing::info!(
            duration_ms = started.elapsed().as_millis(),
            failed = report.failed_count(),
            "Tool pipeline finished\n{}",
            report.render_table()
        );
        report
    }
}

fn emit_log_tail(invocation: &ToolInvocation) {
    let Some(tail) = invocation.tool().log_tail() else {
        return;
    };
    let lines = tail.drain();
    if lines.is_empty() {
        return;
    }
    tracing::error!(tool = %invocation.name(), lines = lines.len(), "Last output before failure:");
    for line in lines {
        tracing::error!(tool = %invocation.name(), "{line}");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
