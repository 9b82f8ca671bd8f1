//! Compatibility aliases
//!
//! Keys exist under two prefixes, the historical `Arbor.X.` and the current
//! `Arbor.Build.`. After resolution every key under one prefix gets a
//! same-valued counterpart under the other, unless the counterpart is already
//! defined. The branch name additionally gets lowercase convenience aliases.

use super::variable::{Variable, VariableSet};
use super::well_known::{BRANCH_NAME, BUILD_PREFIX, LEGACY_PREFIX};

/// Convenience aliases derived from the branch name
pub const BRANCH_ALIASES: [&str; 2] = ["branch", "branch.name"];

const BRANCH_REF_PREFIX: &str = "refs/heads/";

fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let head = key.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &key[prefix.len()..])
}

/// Counterpart key under the other naming convention
#[must_use]
pub fn counterpart(key: &str) -> Option<String> {
    if let Some(rest) = strip_prefix_ignore_case(key, LEGACY_PREFIX) {
        return Some(format!("{BUILD_PREFIX}{rest}"));
    }
    strip_prefix_ignore_case(key, BUILD_PREFIX).map(|rest| format!("{LEGACY_PREFIX}{rest}"))
}

/// Removes a `refs/heads/` prefix from a branch name
#[must_use]
pub fn normalize_branch_name(name: &str) -> &str {
    let name = name.trim();
    strip_prefix_ignore_case(name, BRANCH_REF_PREFIX).unwrap_or(name)
}

/// Adds missing counterpart keys and branch aliases, never overwriting
pub fn apply_compatibility(set: &mut VariableSet) {
    let originals: Vec<Variable> = set.iter().cloned().collect();

    for variable in originals {
        let Some(alias) = counterpart(&variable.key) else {
            continue;
        };
        add_alias(set, alias, variable.value.clone(), &variable.key);
    }

    let branch = set
        .get(BRANCH_NAME)
        .filter(|v| !v.is_blank())
        .map(|v| normalize_branch_name(v.value_str()).to_string());
    if let Some(branch) = branch {
        for alias in BRANCH_ALIASES {
            add_alias(set, alias.to_string(), Some(branch.clone()), BRANCH_NAME);
        }
    }
}

fn add_alias(set: &mut VariableSet, alias: String, value: Option<String>, source: &str) {
    match set.get(&alias) {
        None => {
            tracing::debug!(alias = %alias, source = %source, "Adding compatibility alias");
            set.insert(Variable { key: alias, value });
        }
        Some(existing) if existing.value != value => {
            tracing::debug!(
                alias = %alias,
                source = %source,
                existing = %existing.value_str(),
                "Compatibility alias already defined with a different value, keeping it"
            );
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counterpart() {
        assert_eq!(
            counterpart("Arbor.X.Build.Version").as_deref(),
            Some("Arbor.Build.Build.Version")
        );
        assert_eq!(
            counterpart("arbor.build.Tests.Enabled").as_deref(),
            Some("Arbor.X.Tests.Enabled")
        );
        assert_eq!(counterpart("Configuration"), None);
    }

    #[test]
    fn test_alias_added_when_absent() {
        let mut set = VariableSet::new();
        set.set("Arbor.X.Tests.Enabled", "true");

        apply_compatibility(&mut set);

        assert_eq!(set.value("Arbor.Build.Tests.Enabled"), Some("true"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_existing_counterpart_is_never_overwritten() {
        let mut set = VariableSet::new();
        set.set("Arbor.X.Tests.Enabled", "true");
        set.set("Arbor.Build.Tests.Enabled", "false");

        apply_compatibility(&mut set);

        assert_eq!(set.value("Arbor.X.Tests.Enabled"), Some("true"));
        assert_eq!(set.value("Arbor.Build.Tests.Enabled"), Some("false"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_branch_aliases() {
        let mut set = VariableSet::new();
        set.set(BRANCH_NAME, "refs/heads/feature/login");
        set.set("branch", "custom");

        apply_compatibility(&mut set);

        assert_eq!(set.value("branch"), Some("custom"));
        assert_eq!(set.value("branch.name"), Some("feature/login"));
        assert_eq!(set.value("Arbor.X.Vcs.Branch.Name"), Some("refs/heads/feature/login"));
    }

    #[test]
    fn test_legacy_branch_produces_aliases() {
        let mut set = VariableSet::new();
        set.set("Arbor.X.Vcs.Branch.Name", "main");

        apply_compatibility(&mut set);

        assert_eq!(set.value(BRANCH_NAME), Some("main"));
        assert_eq!(set.value("branch"), Some("main"));
    }

    #[test]
    fn test_normalize_branch_name() {
        assert_eq!(normalize_branch_name("refs/heads/main"), "main");
        assert_eq!(normalize_branch_name(" develop "), "develop");
    }
}
