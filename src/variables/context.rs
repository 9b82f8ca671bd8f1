//! Explicit run context
//!
//! The process environment is read once, at startup, into a [`BuildContext`].
//! Providers, tools and child processes read from and write to this shared
//! map instead of the global environment, so two runs in the same process
//! never leak state into each other.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::variable::parse_bool;

/// Shared key/value context for one run
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    inner: Arc<RwLock<AHashMap<String, String>>>,
}

impl BuildContext {
    /// Creates an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a context from the current process environment
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Seeds a context from explicit pairs
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Gets a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    /// Parses a value as a boolean
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.inner.read().get(key).and_then(|v| parse_bool(v))
    }

    /// Sets a value, returning the previous one
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.write().insert(key.into(), value.into())
    }

    /// Removes a value
    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner.write().remove(key)
    }

    /// Returns true if the key is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Entries whose key starts with `prefix`, ignoring case
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let prefix = prefix.to_lowercase();
        let mut entries: Vec<_> = self
            .inner
            .read()
            .iter()
            .filter(|(k, _)| k.to_lowercase().starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Copies the whole context, for child process environments
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the context is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let context = BuildContext::new();
        let other = context.clone();

        other.set("Arbor.Build.Tests.Enabled", "true");
        assert_eq!(context.get_bool("Arbor.Build.Tests.Enabled"), Some(true));
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_prefix_filter_is_case_insensitive_and_sorted() {
        let context = BuildContext::from_pairs([
            ("arbor.build.b", "2"),
            ("Arbor.Build.A", "1"),
            ("PATH", "/bin"),
        ]);

        let entries = context.with_prefix("Arbor.");
        assert_eq!(
            entries,
            vec![
                ("Arbor.Build.A".to_string(), "1".to_string()),
                ("arbor.build.b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let context = BuildContext::from_pairs([("a", "1")]);
        let snapshot = context.snapshot();
        context.set("b", "2");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(context.remove("a"), Some("1".to_string()));
        assert!(!context.contains("a"));
    }
}
