//! Runtime configuration.
//!
//! Layering: built-in defaults, then an optional TOML file, then
//! environment overrides. Invalid environment values are logged and
//! ignored. Ledger rules (message limit, daily quota) are not configurable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

pub const ENV_DATA_DIR: &str = "BOTTLE_DATA_DIR";
pub const ENV_SNAPSHOT_INTERVAL: &str = "BOTTLE_SNAPSHOT_INTERVAL";
pub const ENV_LOG: &str = "BOTTLE_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Root under which each ledger gets its own directory.
    pub data_dir: PathBuf,
    pub ledger_name: String,
    /// Snapshot every N committed transactions. 0 disables snapshots.
    pub snapshot_interval: u64,
    /// `tracing-subscriber` filter directive, e.g. `info` or `bottle_runtime=debug`.
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".bottle"),
            ledger_name: "default".to_string(),
            snapshot_interval: 100,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Read `path` if given, otherwise start from defaults.
    pub fn load_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    RuntimeError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    /// File layer plus process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup`, a stand-in for the environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_DATA_DIR) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.data_dir = PathBuf::from(trimmed);
            }
        }

        if let Some(raw) = lookup(ENV_SNAPSHOT_INTERVAL) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<u64>() {
                    Ok(value) => self.snapshot_interval = value,
                    Err(err) => {
                        tracing::warn!("invalid {ENV_SNAPSHOT_INTERVAL}, ignoring: {err}");
                    }
                }
            }
        }

        if let Some(raw) = lookup(ENV_LOG) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.log_filter = trimmed.to_string();
            }
        }
    }
}
