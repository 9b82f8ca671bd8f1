//! Variable resolution
//!
//! The resolver runs every registered provider in ascending order, merging each
//! batch into the set with the rules in [`merge_variable`], then applies the
//! compatibility pass. A failing provider aborts resolution; no partial set is
//! ever returned.

use super::compat::apply_compatibility;
use super::context::BuildContext;
use super::provider::ProviderRegistry;
use super::variable::{Variable, VariableSet, eq_ignore_case};
use super::well_known::OVERRIDE_ENABLED;
use crate::errors::{ArborError, Result};
use std::time::Instant;

/// What happened to one incoming variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// The key was new
    Added,
    /// The existing value was blank and got replaced
    FilledBlank,
    /// Both values were blank
    SkippedBlank,
    /// The incoming value was blank, the existing one kept
    IgnoredBlank,
    /// Equal values, ignoring case
    SkippedEqual,
    /// A different value replaced the existing one (override enabled)
    Overridden,
    /// A different value was rejected (override disabled)
    SkippedConflict,
}

/// Merges one variable into `set`
pub fn merge_variable(set: &mut VariableSet, incoming: Variable, provider: &str) -> MergeAction {
    let Some(current) = set.get(&incoming.key) else {
        set.insert(incoming);
        return MergeAction::Added;
    };

    match (current.is_blank(), incoming.is_blank()) {
        (true, true) => {
            tracing::warn!(key = %incoming.key, provider, "Variable is blank in both sources, skipping");
            MergeAction::SkippedBlank
        }
        (true, false) => {
            set.insert(incoming);
            MergeAction::FilledBlank
        }
        (false, true) => MergeAction::IgnoredBlank,
        (false, false) => {
            if eq_ignore_case(current.value_str(), incoming.value_str()) {
                return MergeAction::SkippedEqual;
            }

            if set.is_enabled(OVERRIDE_ENABLED) {
                tracing::info!(
                    key = %incoming.key,
                    provider,
                    old = %current.value_str(),
                    new = %incoming.value_str(),
                    "Overriding variable"
                );
                set.insert(incoming);
                MergeAction::Overridden
            } else {
                tracing::info!(
                    key = %incoming.key,
                    provider,
                    kept = %current.value_str(),
                    rejected = %incoming.value_str(),
                    "Variable already defined, override disabled"
                );
                MergeAction::SkippedConflict
            }
        }
    }
}

/// Runs providers and produces the resolved set
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    registry: ProviderRegistry,
}

impl VariableResolver {
    /// Creates a resolver over `registry`
    #[must_use]
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// The registered providers
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolves variables starting from `seed`
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::Provider`] when any provider fails.
    pub async fn resolve(&self, seed: VariableSet, context: &BuildContext) -> Result<VariableSet> {
        if self.registry.is_empty() {
            return Ok(seed);
        }

        let started = Instant::now();
        let mut set = seed;

        for provider in self.registry.ordered() {
            let name = provider.name().to_string();
            tracing::debug!(provider = %name, order = provider.order(), "Running variable provider");

            let batch = provider.provide(context, &set).await.map_err(|e| {
                let err = match e {
                    ArborError::Provider { .. } => e,
                    other => ArborError::provider(&name, other),
                };
                tracing::error!(provider = %name, error = %err, "Variable provider failed, aborting resolution");
                err
            })?;

            let count = batch.len();
            let mut added = 0usize;
            for variable in batch {
                if matches!(
                    merge_variable(&mut set, variable, &name),
                    MergeAction::Added | MergeAction::FilledBlank | MergeAction::Overridden
                ) {
                    added += 1;
                }
            }
            tracing::debug!(provider = %name, returned = count, applied = added, "Provider finished");
        }

        apply_compatibility(&mut set);

        tracing::info!(
            providers = self.registry.len(),
            variables = set.len(),
            duration_ms = started.elapsed().as_millis(),
            "Variables resolved"
        );
        Ok(set)
    }
}
