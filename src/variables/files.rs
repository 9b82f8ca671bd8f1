//! Variable files at the source root
//!
//! `arbor.variables.json` holds flat key/value pairs checked into the
//! repository; `arbor.variables.json.user` holds local overrides and wins over
//! the base file. Both are applied before any provider runs.

use super::variable::{Variable, VariableSet};
use crate::errors::{ArborError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Base variable file name
pub const VARIABLES_FILE: &str = "arbor.variables.json";

/// Per-user override file name
pub const USER_VARIABLES_FILE: &str = "arbor.variables.json.user";

/// Loads both variable files from `source_root`
///
/// Missing files are skipped.
///
/// # Errors
///
/// Returns [`ArborError::VariableFile`] when a file exists but is not a flat
/// JSON object of scalar values.
pub fn load_variable_files(source_root: &Path) -> Result<VariableSet> {
    let mut seed = VariableSet::new();

    for name in [VARIABLES_FILE, USER_VARIABLES_FILE] {
        let path = source_root.join(name);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Variable file not present");
            continue;
        }

        let variables = read_variable_file(&path)?;
        tracing::info!(path = %path.display(), count = variables.len(), "Loaded variable file");
        for variable in variables {
            seed.insert(variable);
        }
    }

    Ok(seed)
}

/// Reads one variable file
///
/// # Errors
///
/// Returns [`ArborError::VariableFile`] for unreadable or malformed files.
pub fn read_variable_file(path: &Path) -> Result<Vec<Variable>> {
    let invalid = |reason: String| ArborError::VariableFile {
        path: PathBuf::from(path),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let map: serde_json::Map<String, Value> =
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                Value::Bool(b) => Some(b.to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(invalid(format!("value of '{key}' must be a scalar")));
                }
            };
            Ok(Variable { key, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_give_empty_seed() {
        let dir = TempDir::new().unwrap();
        let seed = load_variable_files(dir.path()).unwrap();
        assert!(seed.is_empty());
    }

    #[test]
    fn test_user_file_overrides_base() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(VARIABLES_FILE),
            r#"{"Configuration": "Debug", "Arbor.Build.Tests.Enabled": true, "Retries": 3, "Empty": null}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join(USER_VARIABLES_FILE),
            r#"{"configuration": "Release"}"#,
        )
        .unwrap();

        let seed = load_variable_files(dir.path()).unwrap();
        assert_eq!(seed.len(), 4);
        assert_eq!(seed.value("Configuration"), Some("Release"));
        assert_eq!(seed.value("Arbor.Build.Tests.Enabled"), Some("true"));
        assert_eq!(seed.value("Retries"), Some("3"));
        assert!(seed.get("Empty").unwrap().is_blank());
    }

    #[test]
    fn test_nested_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(VARIABLES_FILE), r#"{"a": {"b": 1}}"#).unwrap();

        let err = load_variable_files(dir.path()).unwrap_err();
        assert!(matches!(err, ArborError::VariableFile { .. }));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(USER_VARIABLES_FILE), "not json").unwrap();

        assert!(load_variable_files(dir.path()).is_err());
    }
}
