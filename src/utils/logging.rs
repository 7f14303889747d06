//! # Logging Setup
//!
//! Structured logging configuration built on `tracing`.
//!
//! Initializes a global `tracing-subscriber` from a [`LoggingConfig`].
//! The `RUST_LOG` environment variable, when set, overrides the configured
//! level so deployments can raise verbosity without touching config files.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber described by `config`.
///
/// Fails with a `Config` error if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={}",
            env!("CARGO_CRATE_NAME"),
            config.log_level.to_string().to_lowercase()
        ))
    });

    let result = if config.json_format {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    result.map_err(|e| ProtocolError::Config(format!("Failed to initialize logging: {e}")))
}
