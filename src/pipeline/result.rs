//! Tool results and the pipeline report

#![allow(clippy::must_use_candidate)]

use super::tool::ToolInvocation;
use crate::executor::ExitCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;

/// Final state of one tool in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Skipped because an earlier tool failed
    NotRun,
    /// Returned a zero exit code
    Succeeded,
    /// Returned non-zero, raised an error or panicked
    Failed,
}

impl ToolOutcome {
    /// Returns true if the tool failed
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if the tool was executed
    pub fn was_run(self) -> bool {
        !matches!(self, Self::NotRun)
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "NOT RUN"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name
    pub name: String,

    /// Declared priority
    pub priority: i32,

    /// Declared run-always flag
    pub run_always: bool,

    /// What happened
    pub outcome: ToolOutcome,

    /// Failure description, if any
    pub message: Option<String>,

    /// Time spent executing (zero when not run)
    pub duration: Duration,

    /// Exit code returned by the tool
    pub exit_code: Option<ExitCode>,
}

impl ToolResult {
    pub(crate) fn not_run(invocation: &ToolInvocation) -> Self {
        Self {
            name: invocation.name().to_string(),
            priority: invocation.priority(),
            run_always: invocation.run_always(),
            outcome: ToolOutcome::NotRun,
            message: Some("skipped after earlier failure".to_string()),
            duration: Duration::ZERO,
            exit_code: None,
        }
    }

    pub(crate) fn executed(
        invocation: &ToolInvocation,
        outcome: ToolOutcome,
        message: Option<String>,
        duration: Duration,
        exit_code: Option<ExitCode>,
    ) -> Self {
        Self {
            name: invocation.name().to_string(),
            priority: invocation.priority(),
            run_always: invocation.run_always(),
            outcome,
            message,
            duration,
            exit_code,
        }
    }
}

/// Overall result of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// `SUCCESS` iff no tool failed, otherwise the last non-zero code
    pub exit_code: ExitCode,

    /// One result per registered tool, in execution order
    pub results: Vec<ToolResult>,
}

impl PipelineReport {
    /// Returns true if no tool failed
    pub fn is_success(&self) -> bool {
        self.exit_code.is_success()
    }

    /// Number of failed tools
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// `(name, outcome)` pairs in execution order
    pub fn outcomes(&self) -> Vec<(&str, ToolOutcome)> {
        self.results
            .iter()
            .map(|r| (r.name.as_str(), r.outcome))
            .collect()
    }

    /// Result of a tool by name
    pub fn result(&self, name: &str) -> Option<&ToolResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Renders the results as a fixed-width text table
    pub fn render_table(&self) -> String {
        const HEADERS: [&str; 4] = ["Tool", "Outcome", "Duration", "Message"];

        let rows: Vec<[String; 4]> = self
            .results
            .iter()
            .map(|r| {
                [
                    r.name.clone(),
                    r.outcome.to_string(),
                    format_duration(r.duration),
                    r.message.clone().unwrap_or_default(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let line = |out: &mut String, cells: [&str; 4]| {
            let rendered: Vec<String> = cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            let _ = writeln!(out, "| {} |", rendered.join(" | "));
        };

        line(&mut out, HEADERS);
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "|-{}-|", separator.join("-|-"));
        for row in &rows {
            line(&mut out, [&row[0], &row[1], &row[2], &row[3]]);
        }
        let _ = write!(
            out,
            "Result: {} ({} of {} tools failed)",
            if self.is_success() { "SUCCESS" } else { "FAILURE" },
            self.failed_count(),
            self.results.len()
        );
        out
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
