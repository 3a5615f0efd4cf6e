//! # feedstore
//!
//! Storage backend for a feed reader: stable item identity and split JSON
//! persistence of subscriptions and their items.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Normalizer (ids) → merge → FileStore → read_all → UI
//! ```
//!
//! - [`domain::identity`]: deterministic item ids (guid, else UUID v5 of a composite key)
//! - [`store`]: metadata document + one items document per feed, migration, retention, pruning
//! - [`normalizer`]: feed documents to items, merged with stored read state
//! - [`fetcher`]: HTTP client with conditional requests and bounded-parallel refresh
//! - [`daemon`]: scheduled pruning
//!
//! ## Quick Start
//!
//! ```bash
//! # Create the store (or migrate a legacy feeds.json)
//! feedstore init
//!
//! # Subscribe and fetch
//! feedstore subscribe https://blog.rust-lang.org/feed.xml
//!
//! # Drop items older than 30 days
//! feedstore prune --days 30
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// fetcher, refresher and normalizer.
pub mod app;

/// Configuration loaded from `~/.config/feedstore/config.toml`.
pub mod config;

/// Scheduled maintenance: periodic pruning, optionally preceded by a refresh.
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`Feed`](domain::Feed) / [`FeedMetadata`](domain::FeedMetadata): subscriptions
/// - [`FeedItem`](domain::FeedItem): stored entries
/// - [`Aggregate`](domain::Aggregate): the hydrated view
/// - [`resolve_id`](domain::resolve_id): stable item ids
pub mod domain;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`Refresher`](fetcher::refresh::Refresher): Concurrent refresh with semaphore
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0
/// into [`FeedItem`](domain::FeedItem)s with stable ids.
pub mod normalizer;

/// Split JSON persistence.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`FileStore`](store::FileStore): File-backed implementation
pub mod store;
