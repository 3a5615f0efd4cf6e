use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid feed item: {0}")]
    InvalidItem(String),

    #[error("Invalid feed id: {0:?}")]
    InvalidFeedId(String),

    #[error("Failed to read {path}: {source}")]
    StorageRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed document {path}: {source}")]
    Schema {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unsupported schema version {found} in {path}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("Cannot migrate feed {feed_id}: {reason}")]
    MigrationBlocked { feed_id: String, reason: String },

    #[error("Failed to prune {path}: {reason}")]
    PartialPrune { path: PathBuf, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
