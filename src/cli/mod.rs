pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::ViewType;

#[derive(Parser)]
#[command(name = "feedstore")]
#[command(about = "Split JSON storage for feed subscriptions and their items", long_about = None)]
pub struct Cli {
    /// Data directory (overrides the config file)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Number of parallel workers for fetching feeds
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the store, migrating a legacy combined feeds.json if present
    Init,
    /// List feeds or items
    List {
        /// Show items instead of feeds
        #[arg(long)]
        items: bool,
        /// Print the hydrated feed list as JSON
        #[arg(long, conflicts_with = "items")]
        json: bool,
    },
    /// Subscribe to a feed
    Subscribe {
        /// URL of the feed
        url: String,
        /// Display title
        #[arg(long)]
        title: Option<String>,
        /// Layout: article, photo or video
        #[arg(long, default_value = "article")]
        view_type: ViewType,
        /// Folder id
        #[arg(long)]
        folder: Option<String>,
        /// Don't fetch items now
        #[arg(long)]
        no_fetch: bool,
    },
    /// Remove a feed and its stored items
    Unsubscribe {
        /// Feed id or URL
        feed: String,
    },
    /// Fetch every feed and store new items
    Refresh,
    /// Remove undated items and items older than the given window
    Prune {
        /// Retention window in days (default: prune_days from the config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Print the stable id of each item in a JSON document
    ResolveId {
        /// URL of the feed the items belong to
        feed_url: String,
        /// JSON file holding one item or an array of items ("-" for stdin)
        #[arg(default_value = "-")]
        path: PathBuf,
    },
    /// Run scheduled maintenance in the foreground
    Daemon {
        /// Interval between runs (e.g., "1h", "30m", "6h", "1d")
        #[arg(short, long)]
        interval: Option<String>,

        /// Refresh feeds before pruning
        #[arg(long)]
        refresh: bool,

        /// Skip the run on start
        #[arg(long)]
        no_initial_run: bool,
    },
}
