use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single entry of a feed as persisted in its items document.
///
/// Fields the store does not interpret (enclosures, creator, the original
/// guid, ...) are carried in `extra` so they survive a read/write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default)]
    pub read: bool,
    /// Category values as the source supplied them (plain names or structured terms).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedItem {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    /// The raw date string used for retention: `isoDate`, else `pubDate`.
    /// Empty strings count as absent.
    pub fn date_field(&self) -> Option<&str> {
        [self.iso_date.as_deref(), self.pub_date.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }

    /// Parsed form of [`date_field`](Self::date_field). `None` when the item
    /// has no date or the date cannot be parsed.
    pub fn effective_date(&self) -> Option<DateTime<Utc>> {
        self.date_field().and_then(parse_date)
    }

    /// Plain-text names of the item's categories.
    pub fn category_names(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter_map(|c| match c {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("_").and_then(Value::as_str),
                _ => None,
            })
            .collect()
    }
}

/// Formats with a numeric offset, colon optional (`+0000`, `+00:00`).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Formats read as UTC once a trailing zone name has been removed.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
];

const UTC_ZONE_NAMES: &[&str] = &["UTC", "GMT", "UT", "Z"];

/// Parse the date formats feeds carry in practice: RFC 3339 (`isoDate`),
/// RFC 2822 (`pubDate`), their common loose variants, and bare ISO
/// date/datetime values read as UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let with_offset = DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        });
    if let Some(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = UTC_ZONE_NAMES
        .iter()
        .find_map(|zone| s.strip_suffix(zone))
        .map(str::trim_end)
        .unwrap_or(s);

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
