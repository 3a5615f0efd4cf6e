use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::app::{Result, StoreError};
use crate::domain::FeedMetadata;
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::{merge_items, Normalizer};
use crate::store::Store;

pub const DEFAULT_WORKERS: usize = 10;

/// What a successful refresh learned about one feed.
#[derive(Debug, Clone, Default)]
pub struct FeedRefresh {
    pub new_items: usize,
    pub title: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl FeedRefresh {
    /// Record fetch bookkeeping on the feed's metadata.
    pub fn apply_to(&self, meta: &mut FeedMetadata) {
        if meta.title.is_none() {
            meta.title = self.title.clone();
        }
        if self.etag.is_some() {
            meta.etag = self.etag.clone();
        }
        if self.last_modified.is_some() {
            meta.last_modified = self.last_modified.clone();
        }
        if self.fetched_at.is_some() {
            meta.last_fetched_at = self.fetched_at;
        }
    }
}

#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub new_items: usize,
    pub errors: Vec<(String, StoreError)>,
}

/// Refreshes feeds with a bounded number of concurrent fetches.
pub struct Refresher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
}

impl Refresher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Refresh every stored feed, then persist fetch bookkeeping with a
    /// single metadata write.
    pub async fn refresh_all<S: Store + Send + Sync + 'static>(
        &self,
        store: Arc<S>,
        normalizer: &Normalizer,
    ) -> RefreshSummary {
        let mut aggregate = store.read_all();
        if aggregate.feeds.is_empty() {
            return RefreshSummary::default();
        }

        let mut handles = Vec::new();

        for feed in &aggregate.feeds {
            let meta = feed.meta.clone();
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let store = store.clone();
            let normalizer = normalizer.clone();

            handles.push(tokio::spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => {
                        refresh_feed(fetcher.as_ref(), &meta, store.as_ref(), &normalizer).await
                    }
                    Err(e) => Err(StoreError::Other(e.to_string())),
                };
                (meta.id, result)
            }));
        }

        let mut summary = RefreshSummary::default();
        for joined in futures::future::join_all(handles).await {
            let (feed_id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                    continue;
                }
            };
            match result {
                Ok(refresh) => {
                    summary.new_items += refresh.new_items;
                    if let Some(feed) = aggregate.feed_mut(&feed_id) {
                        refresh.apply_to(&mut feed.meta);
                    }
                }
                Err(e) => summary.errors.push((feed_id, e)),
            }
        }

        if !store.write_metadata_only(&aggregate) {
            tracing::warn!("Refreshed items were saved but feed metadata was not");
        }

        summary
    }
}

/// Fetch one feed, merge its entries into the stored items and write them back.
pub async fn refresh_feed<S: Store + ?Sized>(
    fetcher: &(dyn Fetcher + Send + Sync),
    meta: &FeedMetadata,
    store: &S,
    normalizer: &Normalizer,
) -> Result<FeedRefresh> {
    let result = fetcher
        .fetch(&meta.url, meta.etag.as_deref(), meta.last_modified.as_deref())
        .await?;

    match result {
        FetchResult::NotModified => {
            tracing::debug!("Feed {} not modified", meta.url);
            Ok(FeedRefresh {
                fetched_at: Some(Utc::now()),
                ..Default::default()
            })
        }
        FetchResult::Content {
            body,
            etag,
            last_modified,
        } => {
            let (feed_meta, fresh) = normalizer.normalize(&meta.url, &body)?;
            let existing = store.read_feed_items(&meta.id);
            let merged = merge_items(&existing, fresh);

            if !store.write_feed_items(&meta.id, &merged.items) {
                return Err(StoreError::Other(format!(
                    "Failed to save items for {}",
                    meta.display_title()
                )));
            }
            tracing::info!("Added {} new items from {}", merged.new_count, meta.url);

            Ok(FeedRefresh {
                new_items: merged.new_count,
                title: feed_meta.title,
                etag,
                last_modified,
                fetched_at: Some(Utc::now()),
            })
        }
    }
}

