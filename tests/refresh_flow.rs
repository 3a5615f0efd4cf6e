use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use feedstore::app::{AppContext, Result, StoreError};
use feedstore::config::Config;
use feedstore::daemon::{Daemon, DaemonConfig};
use feedstore::domain::{Aggregate, Feed, FeedMetadata};
use feedstore::fetcher::refresh::refresh_feed;
use feedstore::fetcher::{FetchResult, Fetcher};
use feedstore::normalizer::Normalizer;
use feedstore::store::{Store, StoreConfig};

/// Serves canned bodies by URL and answers 304 when the caller's etag matches.
#[derive(Default)]
struct StubFetcher {
    bodies: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn serve(&self, url: &str, body: String) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        _last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StoreError::Other(format!("HTTP 404 for {}", url)))?;

        let tag = format!("\"{}\"", body.len());
        if etag == Some(tag.as_str()) {
            return Ok(FetchResult::NotModified);
        }
        Ok(FetchResult::Content {
            body: body.into_bytes(),
            etag: Some(tag),
            last_modified: None,
        })
    }
}

fn rss(entries: &[(&str, i64)]) -> String {
    let items: String = entries
        .iter()
        .map(|(guid, days_ago)| {
            format!(
                "<item><title>{0}</title><link>https://example.com/{0}</link>\
                 <guid>{0}</guid><pubDate>{1}</pubDate></item>",
                guid,
                (Utc::now() - Duration::days(*days_ago)).to_rfc2822()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Stub Feed</title>{}</channel></rss>"#,
        items
    )
}

fn subscribed(url: &str) -> Aggregate {
    let mut aggregate = Aggregate::empty();
    aggregate.feeds.push(Feed::new(FeedMetadata::new(url)));
    aggregate
}

fn create_context(fetcher: Arc<StubFetcher>) -> (AppContext, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = AppContext::with_fetcher(
        Config::default(),
        StoreConfig::new(temp_dir.path()),
        fetcher,
    );
    (ctx, temp_dir)
}

#[test]
fn test_refresh_feed_preserves_read_state() {
    let url = "https://example.com/feed.xml";
    let fetcher = Arc::new(StubFetcher::default());
    fetcher.serve(url, rss(&[("one", 1), ("two", 2)]));
    let (ctx, _dir) = create_context(fetcher.clone());

    let meta = FeedMetadata::new(url);
    let normalizer = Normalizer::new();

    let first = tokio_test::block_on(refresh_feed(
        ctx.fetcher.as_ref(),
        &meta,
        ctx.store.as_ref(),
        &normalizer,
    ))
    .unwrap();
    assert_eq!(first.new_items, 2);
    assert_eq!(first.title.as_deref(), Some("Stub Feed"));

    let mut items = ctx.store.read_feed_items(&meta.id);
    assert_eq!(items.len(), 2);
    items[0].read = true;
    let read_id = items[0].id.clone();
    assert!(ctx.store.write_feed_items(&meta.id, &items));

    // New body: one entry added, stored read flag carried over
    fetcher.serve(url, rss(&[("zero", 0), ("one", 1), ("two", 2)]));
    let second = tokio_test::block_on(refresh_feed(
        ctx.fetcher.as_ref(),
        &meta,
        ctx.store.as_ref(),
        &normalizer,
    ))
    .unwrap();
    assert_eq!(second.new_items, 1);

    let items = ctx.store.read_feed_items(&meta.id);
    assert_eq!(items.len(), 3);
    let read: Vec<_> = items.iter().filter(|i| i.read).map(|i| i.id.as_str()).collect();
    assert_eq!(read, vec![read_id.as_str()]);
}

#[test]
fn test_refresh_feed_drops_entries_past_retention() {
    let url = "https://example.com/old.xml";
    let fetcher = Arc::new(StubFetcher::default());
    fetcher.serve(url, rss(&[("fresh", 1), ("stale", 45)]));
    let (ctx, _dir) = create_context(fetcher);

    let meta = FeedMetadata::new(url);
    tokio_test::block_on(refresh_feed(
        ctx.fetcher.as_ref(),
        &meta,
        ctx.store.as_ref(),
        &ctx.normalizer,
    ))
    .unwrap();

    let items = ctx.store.read_feed_items(&meta.id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_refresh_all_records_fetch_state_and_errors() {
    let good = "https://example.com/good.xml";
    let missing = "https://example.com/missing.xml";
    let fetcher = Arc::new(StubFetcher::default());
    fetcher.serve(good, rss(&[("a", 1)]));
    let (ctx, _dir) = create_context(fetcher.clone());

    let mut aggregate = subscribed(good);
    aggregate.feeds.push(Feed::new(FeedMetadata::new(missing)));
    assert!(ctx.store.write_all(&aggregate));

    let summary = ctx
        .refresher
        .refresh_all(ctx.store.clone(), &ctx.normalizer)
        .await;
    assert_eq!(summary.new_items, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].0, FeedMetadata::new(missing).id);

    let stored = ctx.store.read_all();
    let good_feed = stored.feed_by_url(good).unwrap();
    assert_eq!(good_feed.items.len(), 1);
    assert_eq!(good_feed.meta.title.as_deref(), Some("Stub Feed"));
    assert!(good_feed.meta.etag.is_some());
    assert!(good_feed.meta.last_fetched_at.is_some());

    // Unchanged body comes back as 304 and leaves items alone
    let again = ctx
        .refresher
        .refresh_all(ctx.store.clone(), &ctx.normalizer)
        .await;
    assert_eq!(again.new_items, 0);
    assert_eq!(ctx.store.read_all().feed_by_url(good).unwrap().items.len(), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_refresh_all_without_feeds_fetches_nothing() {
    let fetcher = Arc::new(StubFetcher::default());
    let (ctx, _dir) = create_context(fetcher.clone());

    let summary = ctx
        .refresher
        .refresh_all(ctx.store.clone(), &ctx.normalizer)
        .await;
    assert_eq!(summary.new_items, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_daemon_cycle_refreshes_then_prunes() {
    let url = "https://example.com/feed.xml";
    let fetcher = Arc::new(StubFetcher::default());
    fetcher.serve(url, rss(&[("new", 1)]));
    let (ctx, dir) = create_context(fetcher);

    assert!(ctx.store.write_all(&subscribed(url)));
    let feed_id = FeedMetadata::new(url).id;

    // An undated leftover that only pruning removes
    std::fs::write(
        dir.path().join("storage").join(format!("{}.json", feed_id)),
        r#"{"version": 1, "items": [{"id": "undated"}]}"#,
    )
    .unwrap();

    let daemon = Daemon::new(
        Arc::new(ctx),
        DaemonConfig {
            refresh: true,
            prune_days: 30,
            ..Default::default()
        },
    );
    let report = daemon.run_cycle().await;

    assert_eq!(report.new_items, 1);
    assert_eq!(report.refresh_errors, 0);
    assert_eq!(report.prune.removed_count, 1);
    assert!(report.prune.success);
}
