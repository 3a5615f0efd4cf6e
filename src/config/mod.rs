//! Configuration management for feedstore.
//!
//! Configuration is read from `~/.config/feedstore/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fetcher::refresh::DEFAULT_WORKERS;
use crate::store::{StoreConfig, DEFAULT_RETENTION_DAYS};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSettings,
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Data directory (default: `<data dir>/feedstore`)
    pub data_dir: Option<PathBuf>,
    /// Items older than this are dropped when written (default: 30)
    pub retention_days: u32,
    /// Window used by scheduled pruning (default: 30)
    pub prune_days: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            prune_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Maintenance interval, e.g. "1d", "6h", "30m"
    pub interval: String,
    /// Also refresh every feed on each run
    pub refresh: bool,
    /// Maximum concurrent fetches
    pub workers: usize,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval: "1d".to_string(),
            refresh: false,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. Missing fields use defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/feedstore/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("feedstore").join("config.toml"))
    }

    /// Get the default data directory: `<data dir>/feedstore`
    pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir.join("feedstore"))
    }

    /// Build the store configuration, preferring `data_dir_override`.
    pub fn store_config(&self, data_dir_override: Option<PathBuf>) -> Result<StoreConfig, ConfigError> {
        let data_dir = match data_dir_override.or_else(|| self.storage.data_dir.clone()) {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };
        Ok(StoreConfig::new(data_dir).with_retention_days(self.storage.retention_days))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# feedstore configuration

[storage]
# Where feeds.json and the per-feed item files live.
# Defaults to the platform data directory, e.g. ~/.local/share/feedstore
# data_dir = "/path/to/data"

# Items dated earlier than this many days ago are dropped when a feed is saved.
# Undated items are kept.
retention_days = 30

# Window used by `feedstore prune` and the daemon. Undated items are removed.
prune_days = 30

[daemon]
# How often maintenance runs: "30m", "6h", "1d", ...
interval = "1d"

# Refresh every feed before pruning
refresh = false

# Maximum concurrent feed fetches
workers = 10
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
