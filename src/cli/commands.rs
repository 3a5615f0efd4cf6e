use std::io::Read;
use std::path::Path;

use serde_json::Value;
use url::Url;

use crate::app::{AppContext, Result, StoreError};
use crate::domain::{resolve_value_id, Feed, FeedMetadata, ViewType};
use crate::fetcher::refresh::refresh_feed;
use crate::store::{InitOutcome, Store};

pub fn init(ctx: &AppContext) -> Result<()> {
    let data_dir = ctx.store.config().data_dir.display();
    match ctx.store.initialize() {
        InitOutcome::Created => println!("Created feed store at {}", data_dir),
        InitOutcome::Migrated { feeds } => {
            println!("Migrated {} feeds to split storage at {}", feeds, data_dir)
        }
        InitOutcome::AlreadySplit => println!("Feed store at {} is up to date", data_dir),
        InitOutcome::Failed => {
            return Err(StoreError::Other(format!(
                "Failed to initialize feed store at {}",
                data_dir
            )))
        }
    }
    Ok(())
}

pub fn list_feeds(ctx: &AppContext, json: bool) -> Result<()> {
    let aggregate = ctx.store.read_all();

    if json {
        let out = serde_json::to_string_pretty(&aggregate)
            .map_err(|e| StoreError::Other(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    if aggregate.feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in &aggregate.feeds {
        println!(
            "{} ({} unread)\n  {}\n  id: {}  view: {}",
            feed.meta.display_title(),
            feed.unread_count(),
            feed.meta.url,
            feed.meta.id,
            feed.meta.view_type.layout()
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    let aggregate = ctx.store.read_all();

    if aggregate.item_count() == 0 {
        println!("No items");
        return Ok(());
    }

    for feed in &aggregate.feeds {
        for item in &feed.items {
            let read_marker = if item.read { " " } else { "●" };
            let date = item
                .effective_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "          ".to_string());

            let categories = item.category_names();
            if categories.is_empty() {
                println!("{} {} {}", read_marker, date, item.display_title());
            } else {
                println!(
                    "{} {} {} [{}]",
                    read_marker,
                    date,
                    item.display_title(),
                    categories.join(", ")
                );
            }
        }
    }

    Ok(())
}

pub async fn subscribe(
    ctx: &AppContext,
    url: &str,
    title: Option<String>,
    view_type: ViewType,
    folder: Option<String>,
    fetch: bool,
) -> Result<()> {
    let url = Url::parse(url)?.to_string();
    let mut aggregate = ctx.store.read_all();

    if aggregate.feed_by_url(&url).is_some() {
        println!("Feed already exists: {}", url);
        return Ok(());
    }

    let mut meta = FeedMetadata::new(&url);
    meta.title = title;
    meta.view_type = view_type;
    meta.folder_id = folder;

    if fetch {
        match refresh_feed(ctx.fetcher.as_ref(), &meta, ctx.store.as_ref(), &ctx.normalizer).await {
            Ok(refresh) => {
                refresh.apply_to(&mut meta);
                println!("Fetched {} items", refresh.new_items);
            }
            Err(e) => eprintln!("  ! fetch error: {}", e),
        }
    }

    let feed_id = meta.id.clone();
    aggregate.feeds.push(Feed::new(meta));
    if !ctx.store.write_metadata_only(&aggregate) {
        ctx.store.delete_feed_storage(&feed_id);
        return Err(StoreError::Other(format!("Failed to save subscription to {}", url)));
    }

    println!("Added feed: {} ({})", url, feed_id);
    Ok(())
}

pub fn unsubscribe(ctx: &AppContext, feed: &str) -> Result<()> {
    let mut aggregate = ctx.store.read_all();

    let feed_id = aggregate
        .feed(feed)
        .or_else(|| aggregate.feed_by_url(feed))
        .map(|f| f.meta.id.clone())
        .ok_or_else(|| StoreError::FeedNotFound(feed.to_string()))?;

    if !ctx.store.delete_feed_storage(&feed_id) {
        return Err(StoreError::Other(format!("Failed to delete items of {}", feed)));
    }

    aggregate.remove_feed(&feed_id);
    if !ctx.store.write_metadata_only(&aggregate) {
        return Err(StoreError::Other(format!("Failed to save feed list after removing {}", feed)));
    }

    println!("Removed feed: {}", feed);
    Ok(())
}

pub async fn refresh(ctx: &AppContext) -> Result<()> {
    let summary = ctx
        .refresher
        .refresh_all(ctx.store.clone(), &ctx.normalizer)
        .await;

    for (feed_id, e) in &summary.errors {
        eprintln!("  Error updating {}: {}", feed_id, e);
    }

    println!(
        "Update complete: {} new items, {} errors",
        summary.new_items,
        summary.errors.len()
    );
    Ok(())
}

pub fn prune(ctx: &AppContext, days: u32) -> Result<()> {
    let report = ctx.store.prune_all(days);
    if !report.success {
        return Err(StoreError::Other("Failed to scan item storage".to_string()));
    }

    for path in &report.failed_files {
        eprintln!("  ! skipped {}", path.display());
    }
    println!(
        "Removed {} items older than {} days",
        report.removed_count, days
    );
    Ok(())
}

/// Print `<id>` for every item of a JSON document. Items that can't be
/// resolved are reported and skipped.
pub fn resolve_ids(feed_url: &str, path: &Path) -> Result<()> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    let document: Value = serde_json::from_str(&raw)
        .map_err(|e| StoreError::InvalidItem(format!("not valid JSON: {}", e)))?;

    let items = match document {
        Value::Array(items) => items,
        single => vec![single],
    };

    for (index, item) in items.iter().enumerate() {
        match resolve_value_id(item, feed_url) {
            Ok(id) => println!("{}", id),
            Err(e) => eprintln!("  ! item {}: {}", index, e),
        }
    }

    Ok(())
}
