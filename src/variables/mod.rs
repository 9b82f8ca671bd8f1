//! Variable resolution engine
//!
//! Build configuration is a flat bag of case-insensitive key/value pairs. It
//! is seeded from the variable files at the source root, extended by ordered
//! providers and finally completed with compatibility aliases. The result is
//! a key-sorted [`VariableSet`] that tools only read.
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor::variables::{
//!     BuildContext, ProviderRegistry, StaticVariableProvider, VariableResolver, VariableSet,
//! };
//!
//! # async fn demo() -> arbor::Result<()> {
//! let registry = ProviderRegistry::new()
//!     .with(StaticVariableProvider::new("defaults", 100).with("Configuration", "Debug"));
//! let variables = VariableResolver::new(registry)
//!     .resolve(VariableSet::new(), &BuildContext::new())
//!     .await?;
//! assert_eq!(variables.value("configuration"), Some("Debug"));
//! # Ok(())
//! # }
//! ```

mod compat;
mod context;
mod files;
mod provider;
mod providers;
mod resolver;
mod variable;
pub mod well_known;

pub use compat::{BRANCH_ALIASES, apply_compatibility, counterpart, normalize_branch_name};
pub use context::BuildContext;
pub use files::{USER_VARIABLES_FILE, VARIABLES_FILE, load_variable_files, read_variable_file};
pub use provider::{ProviderRegistry, VariableProvider};
pub use providers::{
    ContextVariableProvider, SourceRootProvider, StaticVariableProvider, VcsBranchProvider,
};
pub use resolver::{MergeAction, VariableResolver, merge_variable};
pub use variable::{Variable, VariableSet, eq_ignore_case, fold_case, parse_bool};
pub use well_known::{VariableDescriptor, WELL_KNOWN_VARIABLES};
