use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::FeedItem;

/// How the reader lays out a feed's items.
///
/// `Waterfall` is the older name of the photo layout. It is kept as its own
/// variant so a stored `"waterfall"` is written back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Article,
    Photo,
    Waterfall,
    Video,
}

impl ViewType {
    /// The layout this value renders as.
    pub fn layout(self) -> Self {
        match self {
            ViewType::Waterfall => ViewType::Photo,
            other => other,
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViewType::Article => "article",
            ViewType::Photo => "photo",
            ViewType::Waterfall => "waterfall",
            ViewType::Video => "video",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ViewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "article" => Ok(Self::Article),
            "photo" => Ok(Self::Photo),
            "waterfall" => Ok(Self::Waterfall),
            "video" => Ok(Self::Video),
            other => Err(format!(
                "Invalid view type: {}. Use article, photo or video",
                other
            )),
        }
    }
}

/// Subscription metadata, stored in the metadata document without items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub view_type: ViewType,
    #[serde(default)]
    pub load_full_content: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Display preferences owned by the UI.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedMetadata {
    /// New subscription for `url`. The id is derived from the URL, so
    /// subscribing to the same address always yields the same id.
    pub fn new(url: &str) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// A feed with its items hydrated from storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(flatten)]
    pub meta: FeedMetadata,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl Feed {
    pub fn new(meta: FeedMetadata) -> Self {
        Self {
            meta,
            items: Vec::new(),
        }
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|i| !i.read).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<ViewType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
