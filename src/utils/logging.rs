//! Structured logging setup.
//!
//! The codec itself only emits `tracing` events; installing a subscriber is
//! left to the application. [`init_logging`] is a convenience for binaries,
//! tests and benches that want the events printed.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install a global fmt subscriber built from `config`.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Returns `Ok(false)`
/// if a global subscriber was already installed, leaving it in place.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level.as_str().to_ascii_lowercase())
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid log filter: {e}")))?,
    };

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(app = %config.app_name, "Logging initialized");
    }
    Ok(installed)
}
