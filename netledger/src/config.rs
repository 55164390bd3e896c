use crate::error::{LedgerError, Result};
use crate::ledger::DEFAULT_WINDOW_DAYS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Days covered by `/data` and `/summary` when no `days` is given
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Record usage on a timer in addition to `/update` requests
    #[serde(default)]
    pub record_interval_secs: Option<u64>,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log to daily-rolling files in this directory instead of stdout
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Number of Tokio runtime worker threads (defaults to CPU cores)
    #[serde(default)]
    pub runtime_threads: Option<usize>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> String {
    "network_traffic.db".to_string()
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "netledger.log".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_path: default_database_path(),
            window_days: default_window_days(),
            record_interval_secs: None,
            log_level: default_log_level(),
            log_dir: None,
            log_file: default_log_file(),
            runtime_threads: None,
        }
    }
}

impl LedgerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| LedgerError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file means "all defaults".
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 {
            return Err(LedgerError::Configuration(
                "window_days must be at least 1".to_string(),
            ));
        }
        if self.record_interval_secs == Some(0) {
            return Err(LedgerError::Configuration(
                "record_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.runtime_threads == Some(0) {
            return Err(LedgerError::Configuration(
                "runtime_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
