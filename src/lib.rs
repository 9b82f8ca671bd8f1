//! # Arbor - self-bootstrapping build orchestration
//!
//! Arbor resolves a build's configuration from ordered variable providers,
//! runs prioritized build tools against it and supervises every external
//! process it starts, including relaunching a pinned version of itself.
//!
//! ## Components
//!
//! - [`variables`]: case-insensitive variable sets, providers and the resolver
//! - [`pipeline`]: prioritized tools with run-always semantics and a results table
//! - [`executor`]: the process supervisor, deadlines and process tree killing
//! - [`bootstrap`]: the launcher that acquires and relaunches the build tool
//! - [`infrastructure`]: configuration and logging
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bootstrap;
pub mod errors;
pub mod executor;
pub mod infrastructure;
pub mod pipeline;
pub mod variables;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use errors::{ArborError, ErrorKind, ProcessFailureKind, Result};
pub use executor::{ExitCode, ProcessInvocation, ProcessSupervisor};
pub use infrastructure::Config;

/// Version of the arbor crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
