//! Configuration parsing for the core engines.
//!
//! Engines take their tunables (database path, store deadline) from a small
//! TOML file so deployments don't hard-code paths.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value failed validation.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Core engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Path to the `SQLite` document store.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Deadline in milliseconds applied to every store call made by an
    /// engine. A hung call surfaces as a retriable timeout instead of
    /// blocking the initiating action indefinitely.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or `store_timeout_ms` is
    /// zero (a zero deadline would fail every store call).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.store_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "store_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Store deadline as a [`Duration`].
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("custos.db")
}

const fn default_store_timeout_ms() -> u64 {
    5000
}
