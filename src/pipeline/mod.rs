//! Priority-ordered tool pipeline
//!
//! Tools are registered explicitly in a [`ToolRegistry`], bound to their
//! declared priority as [`ToolInvocation`]s and executed one at a time by
//! [`ToolPipeline::run_all`], which always returns one [`ToolResult`] per tool.

mod command_tool;
mod registry;
mod result;
mod runner;
mod tail;
mod tool;

#[cfg(test)]
mod pipeline_tests;

pub use command_tool::{CommandTool, env_alias, expand_variables};
pub use registry::ToolRegistry;
pub use result::{PipelineReport, ToolOutcome, ToolResult};
pub use runner::ToolPipeline;
pub use tail::TailBuffer;
pub use tool::{Tool, ToolInvocation};
