//! Logging setup.
//!
//! The library itself only emits `tracing` events. Hosts that have no
//! subscriber of their own can install one from [`LoggingConfig`].

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ConfigError, Result};

/// Install a global subscriber. `RUST_LOG` overrides the configured level.
///
/// Fails with [`ConfigError::Invalid`] when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(config.show_target))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(config.show_target))
            .try_init()
    };

    result.map_err(|e| ConfigError::Invalid(format!("Failed to install logger: {e}")).into())
}
