//! arbor - self-bootstrapping build orchestration
//!
//! ## Commands
//!
//! - `arbor bootstrap` - Acquire the build tool and relaunch it under a deadline
//! - `arbor build` - Resolve build variables and run the configured tools
//! - `arbor variables` - List well-known or resolved variables
//! - `arbor completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch the build tool without running it
//! arbor bootstrap --download-only
//!
//! # Run the configured tools against ./build
//! arbor build -buildDirectory=build
//!
//! # Show what the build would see
//! arbor variables --resolved
//! ```
//!
//! The process exits with 0 on success and 1 on any failure.

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code.normalized().into(),
        Err(e) => {
            tracing::error!(error = %e, "arbor failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
