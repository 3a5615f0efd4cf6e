//! On-disk document shapes.
//!
//! Metadata document (`feeds.json`):
//!
//! ```json
//! { "version": 1, "feeds": [...], "folders": [...], "lastUpdated": "..." }
//! ```
//!
//! Items document (`storage/<feedId>.json`):
//!
//! ```json
//! { "version": 1, "items": [...] }
//! ```
//!
//! Unversioned documents (version 0) are the legacy layout: a metadata
//! document that may still carry inline `items`, and items documents that
//! are a bare JSON array. Both are accepted on read.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::app::{Result, StoreError};
use crate::domain::{parse_date, Aggregate, Feed, FeedItem, FeedMetadata, Folder};

pub const METADATA_VERSION: u32 = 1;
pub const ITEMS_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub feeds: Vec<Feed>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataDocument {
    pub fn parse(path: &Path, raw: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(raw).map_err(|source| StoreError::Schema {
            path: path.to_path_buf(),
            source,
        })?;
        if doc.version > METADATA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: doc.version,
            });
        }
        Ok(doc)
    }

    /// Feeds still carrying items inline.
    pub fn inline_item_feeds(&self) -> usize {
        self.feeds.iter().filter(|f| !f.items.is_empty()).count()
    }

    pub fn into_aggregate(self) -> Aggregate {
        Aggregate {
            feeds: self.feeds,
            folders: self.folders,
            last_updated: self.last_updated,
            extra: self.extra,
        }
    }
}

/// Borrowed metadata document used for writes. Items are never embedded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocumentRef<'a> {
    pub version: u32,
    pub feeds: Vec<&'a FeedMetadata>,
    pub folders: &'a [Folder],
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

impl<'a> MetadataDocumentRef<'a> {
    pub fn new(aggregate: &'a Aggregate, last_updated: DateTime<Utc>) -> Self {
        Self {
            version: METADATA_VERSION,
            feeds: aggregate.feeds.iter().map(|f| &f.meta).collect(),
            folders: &aggregate.folders,
            last_updated,
            extra: &aggregate.extra,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ItemsDocument {
    Versioned {
        version: u32,
        #[serde(default)]
        items: Vec<FeedItem>,
    },
    Legacy(Vec<FeedItem>),
}

impl ItemsDocument {
    pub fn parse(path: &Path, raw: &str) -> Result<Vec<FeedItem>> {
        let doc: Self = serde_json::from_str(raw).map_err(|source| StoreError::Schema {
            path: path.to_path_buf(),
            source,
        })?;
        match doc {
            ItemsDocument::Versioned { version, .. } if version > ITEMS_VERSION => {
                Err(StoreError::UnsupportedVersion {
                    path: path.to_path_buf(),
                    found: version,
                })
            }
            ItemsDocument::Versioned { items, .. } => Ok(items),
            ItemsDocument::Legacy(items) => Ok(items),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemsDocumentRef<'a> {
    pub version: u32,
    pub items: &'a [FeedItem],
}

impl<'a> ItemsDocumentRef<'a> {
    pub fn new(items: &'a [FeedItem]) -> Self {
        Self {
            version: ITEMS_VERSION,
            items,
        }
    }
}

/// A malformed `lastUpdated` is not worth discarding the feed list over.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_date)
        .unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("feeds.json")
    }

    #[test]
    fn test_legacy_metadata_with_inline_items() {
        let raw = r#"{
            "feeds": [
                {"id": "a", "url": "http://a", "items": [{"id": "1"}, {"id": "2"}]},
                {"id": "b", "url": "http://b"}
            ],
            "folders": [{"id": "f", "name": "News"}],
            "lastUpdated": "2024-01-01T00:00:00.000Z",
            "theme": "dark"
        }"#;
        let doc = MetadataDocument::parse(&path(), raw).unwrap();
        assert_eq!(doc.version, 0);
        assert_eq!(doc.inline_item_feeds(), 1);
        assert_eq!(doc.extra["theme"], "dark");
    }

    #[test]
    fn test_newer_metadata_version_rejected() {
        let raw = r#"{"version": 99, "feeds": [], "folders": []}"#;
        let err = MetadataDocument::parse(&path(), raw).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_bad_last_updated_tolerated() {
        let raw = r#"{"feeds": [], "folders": [], "lastUpdated": "yesterday"}"#;
        assert!(MetadataDocument::parse(&path(), raw).is_ok());
    }

    #[test]
    fn test_metadata_write_strips_items() {
        let mut aggregate = Aggregate::empty();
        let mut feed = Feed::new(FeedMetadata::new("http://a"));
        feed.items.push(FeedItem {
            id: "1".into(),
            ..Default::default()
        });
        aggregate.feeds.push(feed);

        let json = serde_json::to_value(MetadataDocumentRef::new(&aggregate, Utc::now())).unwrap();
        assert_eq!(json["version"], METADATA_VERSION);
        assert!(json["feeds"][0].get("items").is_none());
        assert_eq!(json["feeds"][0]["url"], "http://a");
    }

    #[test]
    fn test_items_document_shapes() {
        let legacy = ItemsDocument::parse(&path(), r#"[{"id": "1"}]"#).unwrap();
        assert_eq!(legacy.len(), 1);

        let versioned =
            ItemsDocument::parse(&path(), r#"{"version": 1, "items": [{"id": "1"}, {"id": "2"}]}"#)
                .unwrap();
        assert_eq!(versioned.len(), 2);

        assert!(ItemsDocument::parse(&path(), r#"{"version": 7, "items": []}"#).is_err());
        assert!(ItemsDocument::parse(&path(), r#"{"items": "nope"}"#).is_err());
    }
}
