//! Explicit tool registration

use super::tool::{Tool, ToolInvocation};
use std::sync::Arc;

/// Tools registered at startup, in registration order
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool
    #[must_use]
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Registers a tool in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.push(Arc::new(tool));
    }

    /// Registers a shared tool in place
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Binds every tool, sorted by priority with ties in registration order
    #[must_use]
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        let mut invocations: Vec<_> = self
            .tools
            .iter()
            .enumerate()
            .map(|(index, tool)| ToolInvocation::new(Arc::clone(tool), index))
            .collect();
        invocations.sort_by_key(|inv| (inv.priority(), inv.index()));
        invocations
    }

    /// Tool names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
