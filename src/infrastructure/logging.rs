//! Logging configuration
//!
//! Initializes tracing for the application. `RUST_LOG` takes precedence over
//! the configured level.

/// Initializes logging with the specified level
///
/// Returns false when a global subscriber was already installed.
pub fn init_logging(level: &str, json: bool) -> bool {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
