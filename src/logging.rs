//! Tracing subscriber setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{BusError, Result};

/// Build the filter: `config.filter` directives over a `config.level` default.
///
/// `RUST_LOG`, when set, takes precedence over `config.filter`.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let level: LevelFilter = config
        .level
        .parse()
        .map_err(|_| BusError::Config(format!("invalid log level '{}'", config.level)))?;

    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .or_else(|| config.filter.clone())
        .unwrap_or_default();

    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives))
}

/// Install the global fmt subscriber.
///
/// Returns an error if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(config.with_target)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| BusError::Config(format!("failed to install subscriber: {e}")))
}
