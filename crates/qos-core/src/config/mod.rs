//! Engine configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `#[serde(default)]` values and `Default` implementations
//! 2. **Config file**: TOML file named by the `QOS_CONFIG` env var (default `config/qos.toml`)
//! 3. **Environment variables**: `QOS__*` env vars override individual fields
//!
//! # Configuration Sections
//!
//! - `services`: names of the blockchain services to register
//! - [`EndpointStoreConfig`]: endpoint store capacity and idle eviction
//! - [`MessengerConfig`]: cross-instance observation sharing
//! - [`ArchivalConfig`]: archival reference block used by the EVM strategy
//! - [`LoggingConfig`]: log level and format
//!
//! # Example
//!
//! ```toml
//! services = ["eth", "polygon"]
//!
//! [endpoint_store]
//! max_endpoints = 500
//! endpoint_ttl_seconds = 1800
//!
//! [messenger]
//! enabled = true
//! topic_prefix = "qos.observations"
//! instance_id = "gateway-eu-1"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};
use thiserror::Error;

/// Reasons a loaded configuration is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("endpoint_store.{0} must be greater than 0")]
    ZeroValue(&'static str),

    #[error("messenger.topic_prefix must not be empty")]
    EmptyTopicPrefix,

    #[error("messenger.instance_id must not be empty when set")]
    EmptyInstanceId,

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service {0} is configured more than once")]
    DuplicateService(String),

    #[error("logging.format must be \"pretty\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStoreConfig {
    /// Endpoints tracked per service before the least recently updated is evicted.
    #[serde(default = "default_max_endpoints")]
    pub max_endpoints: usize,
    /// Endpoints not updated for this long are swept.
    #[serde(default = "default_endpoint_ttl_seconds")]
    pub endpoint_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_max_endpoints() -> usize {
    1000
}

fn default_endpoint_ttl_seconds() -> u64 {
    3600
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

impl Default for EndpointStoreConfig {
    fn default() -> Self {
        Self {
            max_endpoints: default_max_endpoints(),
            endpoint_ttl_seconds: default_endpoint_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Stamped on published messages; a random ID is generated when unset.
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_topic_prefix() -> String {
    crate::observation::DEFAULT_TOPIC_PREFIX.to_string()
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self { enabled: true, topic_prefix: default_topic_prefix(), instance_id: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalConfig {
    /// Distance below the perceived head of the archival reference block.
    #[serde(default = "default_archival_offset_blocks")]
    pub archival_offset_blocks: u64,
}

fn default_archival_offset_blocks() -> u64 {
    crate::evm::DEFAULT_ARCHIVAL_OFFSET_BLOCKS
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self { archival_offset_blocks: default_archival_offset_blocks() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `"pretty"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QosConfig {
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub endpoint_store: EndpointStoreConfig,
    #[serde(default)]
    pub messenger: MessengerConfig,
    #[serde(default)]
    pub archival: ArchivalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QosConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Use `__` as a separator for nested fields (e.g. `QOS__ENDPOINT_STORE__MAX_ENDPOINTS=50`).
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("QOS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("services")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from `config/qos.toml`, or the path in `QOS_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("QOS_CONFIG").unwrap_or_else(|_| "config/qos.toml".to_string());
        Self::from_file(&config_path)
    }

    #[must_use]
    pub fn endpoint_ttl(&self) -> Duration {
        Duration::from_secs(self.endpoint_store.endpoint_ttl_seconds)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.endpoint_store.sweep_interval_seconds)
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let store = &self.endpoint_store;
        if store.max_endpoints == 0 {
            return Err(ConfigValidationError::ZeroValue("max_endpoints"));
        }
        if store.endpoint_ttl_seconds == 0 {
            return Err(ConfigValidationError::ZeroValue("endpoint_ttl_seconds"));
        }
        if store.sweep_interval_seconds == 0 {
            return Err(ConfigValidationError::ZeroValue("sweep_interval_seconds"));
        }

        if self.messenger.topic_prefix.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTopicPrefix);
        }
        if self.messenger.instance_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyInstanceId);
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.trim().is_empty() {
                return Err(ConfigValidationError::EmptyServiceName);
            }
            if !seen.insert(service.as_str()) {
                return Err(ConfigValidationError::DuplicateService(service.clone()));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigValidationError::InvalidLogFormat(self.logging.format.clone()));
        }

        Ok(())
    }
}
