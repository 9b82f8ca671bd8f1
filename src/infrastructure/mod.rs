//! Infrastructure layer
//!
//! Configuration loading and logging setup.

mod config;
mod logging;

pub use config::{
    BootstrapConfig, BuildConfig, Config, ENV_BOOTSTRAP_TIMEOUT, ENV_EXIT_DELAY, ENV_LOG_LEVEL,
    MAX_EXIT_DELAY, ToolConfig,
};
pub use logging::init_logging;
