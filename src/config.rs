//! Configuration management for busbind.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. User-specified configuration file
//! 3. Environment variables (prefixed with `BUSBIND_`, sections separated
//!    by `__`, e.g. `BUSBIND_PROXY__DEFAULT_TIMEOUT_MS=5000`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Default prefix for error names raised by service handlers.
pub const DEFAULT_ERROR_NAMESPACE: &str = "org.busbind.Error";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusbindConfig {
    pub proxy: ProxyConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// Proxy defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Call timeout in milliseconds (0 = wait indefinitely)
    pub default_timeout_ms: u64,

    /// Load all properties on initialization
    pub load_properties: bool,

    /// Subscribe to signals and property changes on initialization
    pub connect_signals: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 0,
            load_properties: true,
            connect_signals: true,
        }
    }
}

impl ProxyConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }
}

/// Service dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Prefix for handler error names that carry no namespace of their own
    pub error_namespace: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            error_namespace: DEFAULT_ERROR_NAMESPACE.to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when no filter is given
    pub level: String,

    /// `EnvFilter` directives, e.g. "busbind_core=debug"
    pub filter: Option<String>,

    /// Include the event target in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            with_target: false,
        }
    }
}

impl BusbindConfig {
    /// Load configuration from all sources
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BUSBIND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
