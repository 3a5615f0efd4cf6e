use std::collections::{HashMap, HashSet};

use chrono::{SecondsFormat, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;
use serde_json::Value;

use crate::app::{Result, StoreError};
use crate::domain::{FeedItem, GuidValue, RawItem};

#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: Option<String>,
}

/// Result of folding freshly fetched items into the stored ones.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub items: Vec<FeedItem>,
    pub new_count: usize,
}

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse an RSS/Atom/JSON Feed document into raw, id-less items.
    ///
    /// Entries keep a guid only when the document supplies one; feed-rs
    /// would otherwise synthesize it from link and title.
    pub fn parse(&self, body: &[u8]) -> Result<(FeedMeta, Vec<RawItem>)> {
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(body)
            .map_err(|e| StoreError::FeedParse(e.to_string()))?;

        let meta = FeedMeta {
            title: feed.title.map(|t| decode_html_entities(&t.content).to_string()),
        };

        let items = feed
            .entries
            .into_iter()
            .map(|entry| RawItem {
                guid: (!entry.id.is_empty()).then(|| GuidValue::PlainString(entry.id.clone())),
                link: entry.links.first().map(|l| l.href.clone()),
                title: entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string()),
                iso_date: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)),
                pub_date: None,
                author: entry.authors.first().map(|a| a.name.clone()),
                content: entry
                    .content
                    .and_then(|c| c.body)
                    .map(|b| decode_html_entities(&b).to_string()),
                content_snippet: entry
                    .summary
                    .map(|s| decode_html_entities(&s.content).to_string()),
                categories: entry
                    .categories
                    .into_iter()
                    .map(|c| Value::String(c.label.unwrap_or(c.term)))
                    .collect(),
                extra: Default::default(),
            })
            .collect();

        Ok((meta, items))
    }

    /// Parse a feed document and assign every entry its stable id.
    pub fn normalize(&self, feed_url: &str, body: &[u8]) -> Result<(FeedMeta, Vec<FeedItem>)> {
        let (meta, raw) = self.parse(body)?;
        let items = raw
            .into_iter()
            .map(|item| item.into_feed_item(feed_url))
            .collect();
        Ok((meta, items))
    }
}

/// Fold `fresh` items into `existing` ones.
///
/// Fresh items come first in feed order, carrying over the `read` flag of
/// the stored item with the same id. Stored items the feed no longer lists
/// are kept after them until retention removes them. Duplicate ids within
/// `fresh` keep their first occurrence.
pub fn merge_items(existing: &[FeedItem], fresh: Vec<FeedItem>) -> MergeOutcome {
    let previous: HashMap<&str, &FeedItem> =
        existing.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(existing.len() + fresh.len());
    let mut new_count = 0;

    for mut item in fresh {
        if !seen.insert(item.id.clone()) {
            continue;
        }
        match previous.get(item.id.as_str()) {
            Some(old) => item.read = old.read,
            None => new_count += 1,
        }
        items.push(item);
    }

    for old in existing {
        if seen.insert(old.id.clone()) {
            items.push(old.clone());
        }
    }

    MergeOutcome { items, new_count }
}
