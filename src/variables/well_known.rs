//! Well-known variable names
//!
//! The registry below documents the keys the engine and its built-in tools
//! understand. It backs `arbor variables`; resolution never consults it.

/// Current key prefix
pub const BUILD_PREFIX: &str = "Arbor.Build.";

/// Historical key prefix, kept in sync with [`BUILD_PREFIX`]
pub const LEGACY_PREFIX: &str = "Arbor.X.";

/// Prefix of context entries imported as variables
pub const CONTEXT_PREFIX: &str = "Arbor.";

/// Allows later providers to overwrite a resolved value
pub const OVERRIDE_ENABLED: &str = "Arbor.Build.Variables.OverrideEnabled";

/// Branch currently being built
pub const BRANCH_NAME: &str = "Arbor.Build.Vcs.Branch.Name";

/// Timeout for quick version control queries
pub const VCS_TIMEOUT_SECONDS: &str = "Arbor.Build.Vcs.TimeoutInSeconds";

/// Source root directory
pub const SOURCE_ROOT: &str = "Arbor.Build.SourceRoot";

/// Build output directory
pub const BUILD_DIRECTORY: &str = "Arbor.Build.Directory";

/// Enables test tools
pub const TESTS_ENABLED: &str = "Arbor.Build.Tests.Enabled";

/// Allows prerelease build tool versions
pub const PRERELEASE_ALLOWED: &str = "Arbor.Build.Bootstrapper.AllowPrerelease";

/// Copies the package to a private directory before launching it
pub const DIRECTORY_CLONE_ENABLED: &str = "Arbor.Build.Bootstrapper.DirectoryCloneEnabled";

/// Uses a fixed option set when the bootstrapper gets no arguments
pub const BOOTSTRAPPER_DEBUG: &str = "Arbor.Build.Bootstrapper.Debug";

/// Deadline for the relaunched build process
pub const BOOTSTRAPPER_TIMEOUT_SECONDS: &str = "Arbor.Build.Bootstrapper.TimeoutInSeconds";

/// Pause after the run completes
pub const BOOTSTRAPPER_EXIT_DELAY_MS: &str = "Arbor.Build.Bootstrapper.ExitDelayInMilliseconds";

/// Explicit build tool version
pub const BOOTSTRAPPER_VERSION: &str = "Arbor.Build.Bootstrapper.Version";

/// Package cache directory
pub const PACKAGE_CACHE: &str = "Arbor.Build.Bootstrapper.PackageCache";

/// Directory searched for external tools
pub const TOOLS_DIRECTORY: &str = "Arbor.Build.Tools.Directory";

/// Build configuration name (Debug, Release)
pub const CONFIGURATION: &str = "Arbor.Build.Configuration";

/// Log level of the relaunched build process
pub const LOG_LEVEL: &str = "Arbor.Build.LogLevel";

/// Documentation entry for one well-known key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableDescriptor {
    /// Key
    pub name: &'static str,

    /// What the key controls
    pub description: &'static str,

    /// Value assumed when the key is absent
    pub default: Option<&'static str>,
}

const fn describe(
    name: &'static str,
    description: &'static str,
    default: Option<&'static str>,
) -> VariableDescriptor {
    VariableDescriptor {
        name,
        description,
        default,
    }
}

/// Every well-known key, sorted by name
pub static WELL_KNOWN_VARIABLES: &[VariableDescriptor] = &[
    describe(
        PRERELEASE_ALLOWED,
        "Allow prerelease build tool versions",
        Some("false"),
    ),
    describe(
        BOOTSTRAPPER_DEBUG,
        "Use a fixed option set when the bootstrapper gets no arguments",
        Some("false"),
    ),
    describe(
        DIRECTORY_CLONE_ENABLED,
        "Copy the build tool package to a private directory before launching it",
        Some("false"),
    ),
    describe(
        BOOTSTRAPPER_EXIT_DELAY_MS,
        "Pause after completion so log sinks can flush",
        Some("0"),
    ),
    describe(
        PACKAGE_CACHE,
        "Directory holding downloaded build tool versions",
        Some(".arbor/packages"),
    ),
    describe(
        BOOTSTRAPPER_TIMEOUT_SECONDS,
        "Deadline for the relaunched build process",
        Some("600"),
    ),
    describe(
        BOOTSTRAPPER_VERSION,
        "Explicit build tool version to launch",
        None,
    ),
    describe(
        CONFIGURATION,
        "Build configuration name such as Debug or Release",
        None,
    ),
    describe(BUILD_DIRECTORY, "Build output directory", Some("<source root>/build")),
    describe(LOG_LEVEL, "Log level of the relaunched build process", Some("info")),
    describe(SOURCE_ROOT, "Source root directory", None),
    describe(TESTS_ENABLED, "Run test tools", Some("true")),
    describe(TOOLS_DIRECTORY, "Directory searched for external tools", None),
    describe(
        OVERRIDE_ENABLED,
        "Let later providers overwrite already resolved values",
        Some("false"),
    ),
    describe(BRANCH_NAME, "Branch currently being built", None),
    describe(
        VCS_TIMEOUT_SECONDS,
        "Timeout for quick version control queries",
        Some("5"),
    ),
];

/// Looks up a well-known key, ignoring case
#[must_use]
pub fn lookup(name: &str) -> Option<&'static VariableDescriptor> {
    WELL_KNOWN_VARIABLES
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_sorted_and_unique() {
        let names: Vec<_> = WELL_KNOWN_VARIABLES
            .iter()
            .map(|d| d.name.to_lowercase())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_lookup() {
        let descriptor = lookup("arbor.build.variables.overrideenabled").unwrap();
        assert_eq!(descriptor.default, Some("false"));
        assert!(lookup("Unknown.Key").is_none());
    }

    #[test]
    fn test_keys_use_current_prefix() {
        for descriptor in WELL_KNOWN_VARIABLES {
            assert!(descriptor.name.starts_with(BUILD_PREFIX), "{}", descriptor.name);
        }
    }
}
