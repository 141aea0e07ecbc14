//! Core configuration.
//!
//! # Responsibility
//! - Collect host-tunable settings for logging, id generation and history.
//! - Parse them from JSON with every field optional.

use crate::logging::default_log_level;
use crate::model::ids::IdConfig;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Host settings for one core instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` keeps logging off.
    pub log_dir: Option<PathBuf>,
    pub ids: IdConfig,
    /// Maximum undo history length; `0` keeps every edit.
    pub history_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            ids: IdConfig::default(),
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// Default undo history length.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Configuration parse failure.
#[derive(Debug)]
pub struct ConfigError(serde_json::Error);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid core config: {}", self.0)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(ConfigError)
    }
}
