//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default, so `{}` is a valid
//! configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregation::parse_time_zone;
use crate::observability::{Logger, Severity};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CONFIG_READ",
            ConfigError::Parse { .. } => "CONFIG_PARSE",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Settings shared by the store and the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Field holding each document's unique id
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Time zone used by date math when a query or agg names none
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,

    /// Maximum number of items or rows returned by streaming helpers
    #[serde(default = "default_stream_limit")]
    pub stream_limit: u64,

    /// Minimum severity of emitted log events
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_stream_limit() -> u64 {
    10_000_000
}

fn default_log_level() -> Severity {
    Severity::Warn
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            default_time_zone: default_time_zone(),
            stream_limit: default_stream_limit(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_field.trim().is_empty() {
            return Err(ConfigError::Invalid("id_field must not be empty".into()));
        }
        if self.stream_limit == 0 {
            return Err(ConfigError::Invalid("stream_limit must be > 0".into()));
        }
        if parse_time_zone(&self.default_time_zone).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown default_time_zone '{}'",
                self.default_time_zone
            )));
        }
        Ok(())
    }

    /// Applies `log_level` as the process-wide minimum severity
    pub fn apply_logging(&self) {
        Logger::set_min_severity(self.log_level);
    }
}
