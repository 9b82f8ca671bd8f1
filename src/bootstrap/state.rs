//! Launcher state machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// States the launcher moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherState {
    /// Nothing done yet
    Init,
    /// Finding the directory to build
    ResolveBaseDirectory,
    /// Getting the build tool distributable
    AcquireBuildTool,
    /// Running the build tool
    InvokeBuildTool,
    /// Killing the build tool after the deadline expired
    ProcessTreeKill,
    /// Finished successfully
    Done,
    /// Finished with a failure
    Failed,
}

impl LauncherState {
    /// Returns true for `Done` and `Failed`
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the machine may move from `self` to `next`
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use LauncherState::{
            AcquireBuildTool, Done, Failed, Init, InvokeBuildTool, ProcessTreeKill,
            ResolveBaseDirectory,
        };

        match (self, next) {
            (Init, ResolveBaseDirectory)
            | (ResolveBaseDirectory, AcquireBuildTool)
            | (AcquireBuildTool, InvokeBuildTool | Done)
            | (InvokeBuildTool, Done | ProcessTreeKill)
            | (ProcessTreeKill, Failed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for LauncherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::ResolveBaseDirectory => "ResolveBaseDirectory",
            Self::AcquireBuildTool => "AcquireBuildTool",
            Self::InvokeBuildTool => "InvokeBuildTool",
            Self::ProcessTreeKill => "ProcessTreeKill",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Current state plus every state entered so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    history: Vec<LauncherState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            history: vec![LauncherState::Init],
        }
    }
}

impl StateMachine {
    /// Starts in `Init`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> LauncherState {
        self.history
            .last()
            .copied()
            .unwrap_or(LauncherState::Init)
    }

    /// Moves to `next`, ignoring transitions the machine does not allow
    pub fn advance(&mut self, next: LauncherState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "Ignoring invalid launcher transition");
            return false;
        }
        tracing::debug!(from = %current, to = %next, "Launcher state changed");
        self.history.push(next);
        true
    }

    /// Every state entered, oldest first
    #[must_use]
    pub fn history(&self) -> &[LauncherState] {
        &self.history
    }

    /// Returns true if `state` was ever entered
    #[must_use]
    pub fn visited(&self, state: LauncherState) -> bool {
        self.history.contains(&state)
    }
}
