//! Variable provider contract and registration
//!
//! Providers are registered explicitly at startup; nothing is discovered at
//! runtime.

use super::context::BuildContext;
use super::variable::{Variable, VariableSet};
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A pluggable source of variables
#[async_trait]
pub trait VariableProvider: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Position in the resolution order, ascending
    fn order(&self) -> i32;

    /// Produces a batch of variables given what is already resolved
    ///
    /// # Errors
    ///
    /// Any error aborts the whole resolution.
    async fn provide(&self, context: &BuildContext, existing: &VariableSet)
    -> Result<Vec<Variable>>;
}

/// Ordered list of providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn VariableProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider
    #[must_use]
    pub fn with<P: VariableProvider + 'static>(mut self, provider: P) -> Self {
        self.register(provider);
        self
    }

    /// Registers a provider in place
    pub fn register<P: VariableProvider + 'static>(&mut self, provider: P) {
        self.providers.push(Arc::new(provider));
    }

    /// Registers a shared provider in place
    pub fn register_arc(&mut self, provider: Arc<dyn VariableProvider>) {
        self.providers.push(provider);
    }

    /// Providers sorted by order, ties kept in registration order
    #[must_use]
    pub fn ordered(&self) -> Vec<Arc<dyn VariableProvider>> {
        let mut providers = self.providers.clone();
        providers.sort_by_key(|p| p.order());
        providers
    }

    /// Provider names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
