pub mod file;
pub mod retention;
pub mod schema;

use std::path::PathBuf;

use crate::domain::{Aggregate, FeedItem};

pub use file::FileStore;
pub use retention::DEFAULT_RETENTION_DAYS;

/// Where and how a store keeps its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Write-time retention window in days.
    pub retention_days: u32,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// No metadata document existed; an empty one was written.
    Created,
    /// Inline items of this many feeds were moved to items documents.
    Migrated { feeds: usize },
    /// Nothing to do.
    AlreadySplit,
    /// The store could not be checked; see the log.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_count: usize,
    /// Items documents that could not be processed. Their items are not
    /// counted in `removed_count`.
    pub failed_files: Vec<PathBuf>,
    /// False when the storage directory itself could not be scanned.
    pub success: bool,
}

/// Split feed storage.
///
/// Failures never cross this boundary as errors: reads degrade to empty
/// defaults, writes report `false`, pruning reports the files it skipped.
pub trait Store {
    fn initialize(&self) -> InitOutcome;
    fn read_all(&self) -> Aggregate;
    fn read_feed_items(&self, feed_id: &str) -> Vec<FeedItem>;
    fn write_all(&self, aggregate: &Aggregate) -> bool;
    fn write_metadata_only(&self, aggregate: &Aggregate) -> bool;
    fn write_feed_items(&self, feed_id: &str, items: &[FeedItem]) -> bool;
    fn delete_feed_storage(&self, feed_id: &str) -> bool;
    fn prune_all(&self, retention_days: u32) -> PruneReport;
}
