//! Supervised external process execution
//!
//! This module contains the process supervisor and the primitives it is
//! built from: exit codes, deadlines, process tree termination and scoped
//! temporary workspaces.

mod cancel;
mod exit_code;
mod supervisor;
mod temp_files;
mod tree_kill;

pub use cancel::Deadline;
pub use exit_code::ExitCode;
pub use supervisor::{
    CapturedOutput, LineCallback, ProcessInvocation, ProcessOutcome, ProcessSupervisor,
    SupervisorConfig, resolve_executable,
};
pub use temp_files::TempWorkspace;
pub use tree_kill::{KillOutcome, NoopTreeKiller, ProcessTreeKiller, descendants, platform_tree_killer};

#[cfg(unix)]
pub use tree_kill::UnixTreeKiller;

#[cfg(windows)]
pub use tree_kill::TaskkillTreeKiller;
