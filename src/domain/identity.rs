//! Stable item identifiers.
//!
//! An item keeps the same id across refreshes so that read state and
//! annotations keyed by id survive. Resolution order:
//!
//! 1. a plain string guid is used verbatim;
//! 2. a structured guid (`{"_": "text", "$": {...}}`) yields its text node,
//!    or a SHA-256 of its canonical JSON when it has none;
//! 3. otherwise a UUID v5 of `link|title|date|author|feedUrl`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app::{Result, StoreError};
use crate::domain::FeedItem;

/// Namespace for composite ids (the RFC 4122 DNS namespace).
pub const ITEM_ID_NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

const COMPOSITE_SEPARATOR: &str = "|";

/// Key holding the text node of an XML element converted to JSON.
const GUID_TEXT_FIELD: &str = "_";

/// A guid as feed parsers hand it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuidValue {
    PlainString(String),
    Structured(Map<String, Value>),
    /// Arrays are hashed like structured guids; numbers and booleans are ignored.
    Other(Value),
}

impl GuidValue {
    /// The id this guid stands for, if it is usable.
    pub fn as_id(&self) -> Option<String> {
        match self {
            GuidValue::PlainString(s) if !s.is_empty() => Some(s.clone()),
            GuidValue::Other(value @ Value::Array(_)) => Some(canonical_hash(value)),
            GuidValue::PlainString(_) | GuidValue::Other(_) => None,
            GuidValue::Structured(map) => match map.get(GUID_TEXT_FIELD) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                _ => Some(canonical_hash(&Value::Object(map.clone()))),
            },
        }
    }
}

/// A feed entry before it has been assigned an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<GuidValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawItem {
    /// Assign the stable id and convert into a storable, unread item.
    /// The original guid is kept alongside the other source fields.
    pub fn into_feed_item(self, feed_url: &str) -> FeedItem {
        let id = resolve_id(&self, feed_url);
        let mut extra = self.extra;
        if let Some(guid) = self.guid {
            if let Ok(value) = serde_json::to_value(guid) {
                extra.insert("guid".into(), value);
            }
        }

        FeedItem {
            id,
            link: self.link,
            title: self.title,
            author: self.author,
            iso_date: self.iso_date,
            pub_date: self.pub_date,
            content: self.content,
            content_snippet: self.content_snippet,
            read: false,
            categories: self.categories,
            extra,
        }
    }
}

/// Resolve the stable id of `item` within the feed at `feed_url`.
pub fn resolve_id(item: &RawItem, feed_url: &str) -> String {
    if let Some(id) = item.guid.as_ref().and_then(GuidValue::as_id) {
        return id;
    }
    composite_id(item, feed_url)
}

/// Resolve the id of an untyped item as produced by a feed parser.
///
/// Only a missing item is an error; absent or mistyped optional fields
/// fall through to the composite key.
pub fn resolve_value_id(item: &Value, feed_url: &str) -> Result<String> {
    let Value::Object(fields) = item else {
        return Err(StoreError::InvalidItem(format!(
            "expected an object, found {}",
            value_kind(item)
        )));
    };

    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(String::from);
    let raw = RawItem {
        guid: fields
            .get("guid")
            .filter(|g| !g.is_null())
            .cloned()
            .and_then(|g| serde_json::from_value(g).ok()),
        link: text("link"),
        title: text("title"),
        iso_date: text("isoDate"),
        pub_date: text("pubDate"),
        author: text("author"),
        ..Default::default()
    };

    Ok(resolve_id(&raw, feed_url))
}

/// UUID v5 over the fixed-order composite of the item's fields.
pub fn composite_id(item: &RawItem, feed_url: &str) -> String {
    let date = item
        .iso_date
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(item.pub_date.as_deref())
        .unwrap_or("");

    let payload = [
        item.link.as_deref().unwrap_or(""),
        item.title.as_deref().unwrap_or(""),
        date,
        item.author.as_deref().unwrap_or(""),
        feed_url,
    ]
    .join(COMPOSITE_SEPARATOR);

    Uuid::new_v5(&ITEM_ID_NAMESPACE, payload.as_bytes()).to_string()
}

fn canonical_hash(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(values) => {
            out.push('[');
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FEED: &str = "http://example.com/feed";

    fn raw(link: &str, title: &str) -> RawItem {
        RawItem {
            link: Some(link.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_guid_returned_verbatim() {
        let mut item = raw("http://example.com/1", "Ignored");
        item.guid = Some(GuidValue::PlainString("abc".into()));
        assert_eq!(resolve_id(&item, FEED), "abc");
        assert_eq!(resolve_id(&item, "http://other.com/feed"), "abc");
    }

    #[test]
    fn test_guid_only_item() {
        let id = resolve_value_id(&json!({"guid": "abc"}), FEED).unwrap();
        assert_eq!(id, "abc");
    }

    #[test]
    fn test_structured_guid_text_node() {
        let item = json!({
            "guid": {"_": "unique-string-2", "$": {"isPermaLink": "false"}},
            "link": "http://example.com/2"
        });
        assert_eq!(resolve_value_id(&item, FEED).unwrap(), "unique-string-2");
    }

    #[test]
    fn test_structured_guid_without_text_is_hashed_canonically() {
        let a = json!({"guid": {"$": {"isPermaLink": "false"}}});
        let id = resolve_value_id(&a, FEED).unwrap();
        assert_eq!(
            id,
            "0b9ba73beaa704cdd2390fc499f2c1d998d0391c0ca700308e3951daeb8a4a17"
        );

        // key order must not matter
        let b = json!({"guid": {"z": 1, "a": {"y": true, "b": null}}});
        let c = json!({"guid": {"a": {"b": null, "y": true}, "z": 1}});
        assert_eq!(
            resolve_value_id(&b, FEED).unwrap(),
            resolve_value_id(&c, FEED).unwrap()
        );
    }

    #[test]
    fn test_composite_matches_uuid_v5() {
        let item = json!({
            "link": "http://x/1",
            "title": "A",
            "isoDate": "2024-01-01",
            "author": "B"
        });
        let first = resolve_value_id(&item, "http://x/feed").unwrap();
        let second = resolve_value_id(&item.clone(), "http://x/feed").unwrap();
        assert_eq!(first, "6694330e-9502-5d65-b330-bad7f1042ca7");
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let item = raw("http://example.com/3", "");
        let mut bare = item.clone();
        bare.title = None;
        assert_eq!(
            resolve_id(&bare, FEED),
            "ab84f849-70df-56b6-8c54-f5d533d1c957"
        );
        assert_eq!(resolve_id(&item, FEED), resolve_id(&bare, FEED));
    }

    #[test]
    fn test_same_link_different_title() {
        let a = raw("http://example.com/home", "Article 1");
        let b = raw("http://example.com/home", "Article 2");
        assert_ne!(resolve_id(&a, FEED), resolve_id(&b, FEED));
    }

    #[test]
    fn test_feed_url_isolates_ids() {
        let item = raw("http://example.com/home", "Article");
        assert_ne!(
            resolve_id(&item, "http://a.com/feed"),
            resolve_id(&item, "http://b.com/feed")
        );
    }

    #[test]
    fn test_pub_date_used_when_iso_date_missing() {
        let mut a = raw("l", "t");
        a.pub_date = Some("Mon, 01 Jan 2024 00:00:00 GMT".into());
        let mut b = a.clone();
        b.pub_date = Some("Tue, 02 Jan 2024 00:00:00 GMT".into());
        assert_ne!(resolve_id(&a, FEED), resolve_id(&b, FEED));
    }

    #[test]
    fn test_array_guid_is_hashed_canonically() {
        let item = json!({"guid": ["a", {"b": 1}], "link": "l"});
        let id = resolve_value_id(&item, FEED).unwrap();
        assert_eq!(
            id,
            "3d6f51e1fd2489c7f062f0347a710fa6a5f238bdd8c8bf55741236400da86492"
        );
        assert_ne!(id, resolve_value_id(&json!({"link": "l"}), FEED).unwrap());
    }

    #[test]
    fn test_unusable_guids_fall_through() {
        let composite = resolve_value_id(&json!({"link": "l"}), FEED).unwrap();
        for guid in [json!(""), json!(42), json!(null)] {
            let id = resolve_value_id(&json!({"guid": guid, "link": "l"}), FEED).unwrap();
            assert_eq!(id, composite);
        }
    }

    #[test]
    fn test_null_item_is_invalid() {
        let err = resolve_value_id(&Value::Null, FEED).unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem(_)));
        assert!(resolve_value_id(&json!("guid"), FEED).is_err());
    }

    #[test]
    fn test_into_feed_item_keeps_guid() {
        let mut item = raw("http://example.com/1", "T");
        item.guid = Some(GuidValue::PlainString("g-1".into()));
        let stored = item.into_feed_item(FEED);
        assert_eq!(stored.id, "g-1");
        assert_eq!(stored.extra["guid"], "g-1");
        assert!(!stored.read);
    }
}
