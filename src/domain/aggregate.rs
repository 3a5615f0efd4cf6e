use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Feed, Folder};

/// The fully hydrated view: every feed with its items, plus folders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub feeds: Vec<Feed>,
    pub folders: Vec<Folder>,
    pub last_updated: DateTime<Utc>,
    /// Top-level keys owned by other collaborators.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aggregate {
    /// `{feeds: [], folders: [], lastUpdated: now}`
    pub fn empty() -> Self {
        Self {
            feeds: Vec::new(),
            folders: Vec::new(),
            last_updated: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn feed(&self, id: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.meta.id == id)
    }

    pub fn feed_mut(&mut self, id: &str) -> Option<&mut Feed> {
        self.feeds.iter_mut().find(|f| f.meta.id == id)
    }

    pub fn feed_by_url(&self, url: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.meta.url == url)
    }

    /// Remove a feed from the aggregate, returning it if present.
    pub fn remove_feed(&mut self, id: &str) -> Option<Feed> {
        let pos = self.feeds.iter().position(|f| f.meta.id == id)?;
        Some(self.feeds.remove(pos))
    }

    pub fn item_count(&self) -> usize {
        self.feeds.iter().map(|f| f.items.len()).sum()
    }
}
