//! Variable and variable set types

use crate::errors::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A named build configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Key, unique within a set regardless of case
    pub key: String,

    /// Value, `None` when the key is declared without one
    pub value: Option<String>,
}

impl Variable {
    /// Creates a variable with a value
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a variable without a value
    #[must_use]
    pub fn unset(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Returns true if the value is missing or whitespace only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.value.as_deref().is_none_or(|v| v.trim().is_empty())
    }

    /// Value as a string slice, empty when unset
    #[must_use]
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value_str())
    }
}

/// Parses the boolean spellings accepted in variable values
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Folds case the way keys and values are compared
#[must_use]
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Compares two strings ignoring case, with the same folding as keys
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || fold_case(a) == fold_case(b)
}

/// Case-insensitive, key-sorted collection of variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    entries: BTreeMap<String, Variable>,
}

impl VariableSet {
    /// Creates an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &str) -> String {
        fold_case(key)
    }

    /// Gets a variable by key, ignoring case
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.entries.get(&Self::normalize(key))
    }

    /// Gets a variable's value by key, ignoring case
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.value.as_deref())
    }

    /// Returns true if the key is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&Self::normalize(key))
    }

    /// Inserts or replaces a variable, returning the previous one
    pub fn insert(&mut self, variable: Variable) -> Option<Variable> {
        self.entries.insert(Self::normalize(&variable.key), variable)
    }

    /// Inserts or replaces a key with a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<Variable> {
        self.insert(Variable::new(key, value))
    }

    /// Removes a variable by key
    pub fn remove(&mut self, key: &str) -> Option<Variable> {
        self.entries.remove(&Self::normalize(key))
    }

    /// Iterates variables in key order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.entries.values()
    }

    /// Number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a value as a boolean
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(parse_bool)
    }

    /// Returns true only if the key holds a true boolean
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get_bool(key).unwrap_or(false)
    }

    /// Returns the non-blank value of a key
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::MissingVariable`] when the key is absent or blank
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(variable) if !variable.is_blank() => Ok(variable.value_str()),
            _ => Err(ArborError::MissingVariable {
                key: key.to_string(),
            }),
        }
    }

    /// Exports variables with values as environment pairs
    #[must_use]
    pub fn to_env_map(&self) -> HashMap<String, String> {
        self.iter()
            .filter_map(|v| v.value.clone().map(|value| (v.key.clone(), value)))
            .collect()
    }
}

impl FromIterator<Variable> for VariableSet {
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        let mut set = Self::new();
        for variable in iter {
            set.insert(variable);
        }
        set
    }
}

impl<'a> IntoIterator for &'a VariableSet {
    type Item = &'a Variable;
    type IntoIter = std::collections::btree_map::Values<'a, String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl IntoIterator for VariableSet {
    type Item = Variable;
    type IntoIter = std::collections::btree_map::IntoValues<String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut set = VariableSet::new();
        set.set("Configuration", "Debug");
        set.set("CONFIGURATION", "Release");

        assert_eq!(set.len(), 1);
        assert_eq!(set.value("configuration"), Some("Release"));
        assert_eq!(set.get("Configuration").unwrap().key, "CONFIGURATION");
    }

    #[test]
    fn test_non_ascii_keys_fold_like_values() {
        let mut set = VariableSet::new();
        set.set("Größe", "1");

        assert_eq!(set.value("GRÖSSE"), None);
        assert_eq!(set.value("GRÖßE"), Some("1"));
        assert!(eq_ignore_case("ÄRGER", "ärger"));
        assert!(!eq_ignore_case("Ärger", "Aerger"));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let set: VariableSet = vec![
            Variable::new("zeta", "1"),
            Variable::new("Alpha", "2"),
            Variable::new("beta", "3"),
        ]
        .into_iter()
        .collect();

        let keys: Vec<_> = set.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_blank_detection() {
        assert!(Variable::unset("a").is_blank());
        assert!(Variable::new("a", "  ").is_blank());
        assert!(!Variable::new("a", "x").is_blank());
    }

    #[test]
    fn test_require() {
        let mut set = VariableSet::new();
        set.set("present", "value");
        set.insert(Variable::unset("blank"));

        assert_eq!(set.require("PRESENT").unwrap(), "value");
        assert_eq!(
            set.require("blank"),
            Err(ArborError::MissingVariable {
                key: "blank".to_string()
            })
        );
        assert!(set.require("absent").is_err());
    }

    #[test]
    fn test_bool_parsing() {
        let mut set = VariableSet::new();
        set.set("a", "TRUE");
        set.set("b", "0");
        set.set("c", "maybe");

        assert_eq!(set.get_bool("a"), Some(true));
        assert_eq!(set.get_bool("b"), Some(false));
        assert_eq!(set.get_bool("c"), None);
        assert!(!set.is_enabled("c"));
        assert!(!set.is_enabled("missing"));
    }

    #[test]
    fn test_env_map_skips_unset() {
        let mut set = VariableSet::new();
        set.set("a", "1");
        set.insert(Variable::unset("b"));

        let env = set.to_env_map();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("a"), Some(&"1".to_string()));
    }
}
