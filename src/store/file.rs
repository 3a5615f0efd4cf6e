use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::app::{Result, StoreError};
use crate::domain::{Aggregate, FeedItem};
use crate::store::retention;
use crate::store::schema::{ItemsDocument, ItemsDocumentRef, MetadataDocument, MetadataDocumentRef};
use crate::store::{InitOutcome, PruneReport, Store, StoreConfig};

const METADATA_FILE: &str = "feeds.json";
const STORAGE_DIR: &str = "storage";

/// JSON file store: one metadata document plus one items document per feed.
///
/// ```text
/// <data_dir>/
/// ├── feeds.json          # feeds (without items), folders, lastUpdated
/// └── storage/
///     └── <feedId>.json   # items of one feed
/// ```
///
/// Every write goes to a sibling `.tmp` file that is then renamed over the
/// target. Writes to the same feed are serialized by a per-feed lock.
pub struct FileStore {
    config: StoreConfig,
    metadata_path: PathBuf,
    storage_dir: PathBuf,
    metadata_lock: Mutex<()>,
    feed_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        let metadata_path = config.data_dir.join(METADATA_FILE);
        let storage_dir = config.data_dir.join(STORAGE_DIR);
        Self {
            config,
            metadata_path,
            storage_dir,
            metadata_lock: Mutex::new(()),
            feed_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Path of a feed's items document. Rejects ids that are not plain file names.
    pub fn items_path(&self, feed_id: &str) -> Result<PathBuf> {
        let safe = !feed_id.is_empty()
            && feed_id != "."
            && feed_id != ".."
            && !feed_id.contains(['/', '\\', '\0']);
        if !safe {
            return Err(StoreError::InvalidFeedId(feed_id.to_string()));
        }
        Ok(self.storage_dir.join(format!("{}.json", feed_id)))
    }

    fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_dir).map_err(|source| StoreError::StorageWrite {
            path: self.storage_dir.clone(),
            source,
        })
    }

    fn feed_lock(&self, feed_id: &str) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.feed_locks);
        locks.entry(feed_id.to_string()).or_default().clone()
    }

    fn load_metadata(&self) -> Result<Option<MetadataDocument>> {
        match read_optional(&self.metadata_path)? {
            Some(raw) => MetadataDocument::parse(&self.metadata_path, &raw).map(Some),
            None => Ok(None),
        }
    }

    fn load_items(&self, feed_id: &str) -> Result<Option<Vec<FeedItem>>> {
        let path = self.items_path(feed_id)?;
        match read_optional(&path)? {
            Some(raw) => ItemsDocument::parse(&path, &raw).map(Some),
            None => Ok(None),
        }
    }

    fn store_metadata(&self, aggregate: &Aggregate, last_updated: DateTime<Utc>) -> Result<()> {
        let _guard = lock(&self.metadata_lock);
        write_json_atomic(
            &self.metadata_path,
            &MetadataDocumentRef::new(aggregate, last_updated),
        )
    }

    fn store_items(&self, feed_id: &str, items: &[FeedItem]) -> Result<usize> {
        let path = self.items_path(feed_id)?;
        let kept = retention::filter_for_write(items, self.config.retention_days);

        let feed_lock = self.feed_lock(feed_id);
        let _guard = lock(&feed_lock);
        write_json_atomic(&path, &ItemsDocumentRef::new(&kept))?;

        debug!(
            "Wrote {} items for feed {} ({} dropped by retention)",
            kept.len(),
            feed_id,
            items.len() - kept.len()
        );
        Ok(kept.len())
    }

    /// Attach items to every feed of a metadata document. An items document
    /// wins over inline items; inline items are used only when the document
    /// is absent.
    fn hydrate(&self, doc: MetadataDocument) -> Aggregate {
        let mut aggregate = doc.into_aggregate();
        for feed in &mut aggregate.feeds {
            let inline = std::mem::take(&mut feed.items);
            if feed.meta.id.is_empty() {
                feed.items = inline;
                continue;
            }
            feed.items = match self.load_items(&feed.meta.id) {
                Ok(Some(items)) => items,
                Ok(None) => inline,
                Err(e) => {
                    warn!("Failed to read items for feed {}: {}", feed.meta.id, e);
                    Vec::new()
                }
            };
        }
        aggregate
    }

    fn try_initialize(&self) -> Result<InitOutcome> {
        self.ensure_directories()?;

        let Some(doc) = self.load_metadata()? else {
            self.store_metadata(&Aggregate::empty(), Utc::now())?;
            info!("Created empty feed store at {}", self.config.data_dir.display());
            return Ok(InitOutcome::Created);
        };

        let legacy_feeds = doc.inline_item_feeds();
        if legacy_feeds == 0 {
            return Ok(InitOutcome::AlreadySplit);
        }

        info!("Migrating {} feeds to split storage", legacy_feeds);
        self.migrate(doc)?;
        info!("Migration complete");
        Ok(InitOutcome::Migrated {
            feeds: legacy_feeds,
        })
    }

    /// Move inline items into items documents, then rewrite the metadata
    /// without them. An existing items document wins over inline items and
    /// is left as it is. If any feed carrying inline items has a document
    /// that cannot be read, nothing is written.
    fn migrate(&self, doc: MetadataDocument) -> Result<()> {
        let aggregate = doc.into_aggregate();

        let mut pending = Vec::new();
        for feed in &aggregate.feeds {
            if feed.items.is_empty() || feed.meta.id.is_empty() {
                continue;
            }
            match self.load_items(&feed.meta.id) {
                Ok(Some(_)) => debug!("Feed {} already has an items document", feed.meta.id),
                Ok(None) => pending.push(feed),
                Err(e) => {
                    return Err(StoreError::MigrationBlocked {
                        feed_id: feed.meta.id.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        for feed in pending {
            self.store_items(&feed.meta.id, &feed.items)?;
        }
        self.store_metadata(&aggregate, Utc::now())
    }

    fn try_read_all(&self) -> Result<Aggregate> {
        match self.load_metadata()? {
            Some(doc) => Ok(self.hydrate(doc)),
            None => Ok(Aggregate::empty()),
        }
    }

    fn try_write_all(&self, aggregate: &Aggregate) -> Result<()> {
        self.ensure_directories()?;
        self.store_metadata(aggregate, Utc::now())?;

        for feed in &aggregate.feeds {
            if feed.meta.id.is_empty() {
                continue;
            }
            if let Err(e) = self.store_items(&feed.meta.id, &feed.items) {
                error!("Failed to write items for feed {}: {}", feed.meta.id, e);
            }
        }
        Ok(())
    }

    fn item_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.storage_dir).map_err(|source| StoreError::StorageRead {
            path: self.storage_dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn prune_file(&self, path: &Path, cutoff: DateTime<Utc>) -> Result<usize> {
        let feed_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let feed_lock = self.feed_lock(&feed_id);
        let _guard = lock(&feed_lock);

        let raw = fs::read_to_string(path).map_err(|source| StoreError::StorageRead {
            path: path.to_path_buf(),
            source,
        })?;
        let items = ItemsDocument::parse(path, &raw)?;
        let before = items.len();
        let kept: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| retention::keep_on_prune(item, cutoff))
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            write_json_atomic(path, &ItemsDocumentRef::new(&kept))?;
            debug!("Pruned {} items from {}", removed, path.display());
        }
        Ok(removed)
    }
}

impl Store for FileStore {
    fn initialize(&self) -> InitOutcome {
        match self.try_initialize() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to initialize feed store: {}", e);
                InitOutcome::Failed
            }
        }
    }

    fn read_all(&self) -> Aggregate {
        self.initialize();
        match self.try_read_all() {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!("Failed to read feeds, using empty defaults: {}", e);
                Aggregate::empty()
            }
        }
    }

    fn read_feed_items(&self, feed_id: &str) -> Vec<FeedItem> {
        match self.load_items(feed_id) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read items for feed {}: {}", feed_id, e);
                Vec::new()
            }
        }
    }

    fn write_all(&self, aggregate: &Aggregate) -> bool {
        match self.try_write_all(aggregate) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write feeds: {}", e);
                false
            }
        }
    }

    fn write_metadata_only(&self, aggregate: &Aggregate) -> bool {
        let result = self
            .ensure_directories()
            .and_then(|_| self.store_metadata(aggregate, Utc::now()));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write feed metadata: {}", e);
                false
            }
        }
    }

    fn write_feed_items(&self, feed_id: &str, items: &[FeedItem]) -> bool {
        let result = self
            .ensure_directories()
            .and_then(|_| self.store_items(feed_id, items));
        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to write items for feed {}: {}", feed_id, e);
                false
            }
        }
    }

    fn delete_feed_storage(&self, feed_id: &str) -> bool {
        let path = match self.items_path(feed_id) {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to delete storage: {}", e);
                return false;
            }
        };

        let feed_lock = self.feed_lock(feed_id);
        let _guard = lock(&feed_lock);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                error!("Failed to delete storage for {}: {}", feed_id, e);
                false
            }
        }
    }

    fn prune_all(&self, retention_days: u32) -> PruneReport {
        let files = match self.ensure_directories().and_then(|_| self.item_files()) {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to clean up old items: {}", e);
                return PruneReport::default();
            }
        };

        let cutoff = retention::cutoff(retention_days, Utc::now());
        let mut report = PruneReport {
            success: true,
            ..Default::default()
        };

        for path in files {
            match self.prune_file(&path, cutoff) {
                Ok(removed) => report.removed_count += removed,
                Err(e) => {
                    let err = StoreError::PartialPrune {
                        path: path.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", err);
                    report.failed_files.push(path);
                }
            }
        }

        info!(
            "Pruned {} items older than {} days",
            report.removed_count, retention_days
        );
        report
    }
}

/// Lock a mutex guarding no data; poisoning carries no meaning here.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::StorageRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    let written = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));

    written.map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::StorageWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(temp_dir.path()));
        (store, temp_dir)
    }

    #[test]
    fn test_items_path_rejects_traversal() {
        let (store, _dir) = create_test_store();
        assert!(store.items_path("feed-1").is_ok());
        for bad in ["", ".", "..", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(store.items_path(bad), Err(StoreError::InvalidFeedId(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_initialize_creates_empty_store() {
        let (store, dir) = create_test_store();
        assert_eq!(store.initialize(), InitOutcome::Created);
        assert!(dir.path().join("feeds.json").exists());
        assert!(dir.path().join("storage").is_dir());
        assert_eq!(store.initialize(), InitOutcome::AlreadySplit);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (store, dir) = create_test_store();
        let items = vec![FeedItem {
            id: "a".into(),
            ..Default::default()
        }];
        assert!(store.write_feed_items("feed-1", &items));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("storage"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert_eq!(store.read_feed_items("feed-1"), items);
    }

    #[test]
    fn test_invalid_feed_id_write_fails() {
        let (store, _dir) = create_test_store();
        assert!(!store.write_feed_items("../escape", &[]));
        assert!(!store.delete_feed_storage("../escape"));
    }

    #[test]
    fn test_delete_missing_storage_is_noop() {
        let (store, _dir) = create_test_store();
        store.initialize();
        assert!(store.delete_feed_storage("never-written"));
    }

    #[test]
    fn test_store_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FileStore>();
    }
}
