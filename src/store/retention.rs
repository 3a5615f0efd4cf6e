//! Age-based item retention.
//!
//! Two rules apply and they intentionally differ on undated items:
//! writes keep them, pruning removes them.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{parse_date, FeedItem};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub fn cutoff(retention_days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(retention_days))
}

/// Write-time rule: undated items are kept, dated items must be on or after
/// `cutoff`. A date that does not parse counts as too old.
pub fn keep_on_write(item: &FeedItem, cutoff: DateTime<Utc>) -> bool {
    match item.date_field() {
        None => true,
        Some(raw) => parse_date(raw).is_some_and(|date| date >= cutoff),
    }
}

/// Prune-time rule: only items with a parseable date on or after `cutoff` survive.
pub fn keep_on_prune(item: &FeedItem, cutoff: DateTime<Utc>) -> bool {
    item.effective_date().is_some_and(|date| date >= cutoff)
}

pub fn filter_for_write(items: &[FeedItem], retention_days: u32) -> Vec<FeedItem> {
    let cutoff = cutoff(retention_days, Utc::now());
    items
        .iter()
        .filter(|item| keep_on_write(item, cutoff))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(id: &str, days_ago: i64) -> FeedItem {
        FeedItem {
            id: id.into(),
            iso_date: Some((Utc::now() - Duration::days(days_ago)).to_rfc3339()),
            ..Default::default()
        }
    }

    fn undated(id: &str) -> FeedItem {
        FeedItem {
            id: id.into(),
            ..Default::default()
        }
    }

    fn ids(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_write_keeps_undated() {
        let items = vec![dated("old", 40), dated("recent", 10), undated("none")];
        let kept = filter_for_write(&items, DEFAULT_RETENTION_DAYS);
        assert_eq!(ids(&kept), vec!["recent", "none"]);
    }

    #[test]
    fn test_prune_drops_undated() {
        let cutoff = cutoff(DEFAULT_RETENTION_DAYS, Utc::now());
        let items = [dated("old", 40), dated("recent", 10), undated("none")];
        let kept: Vec<&str> = items
            .iter()
            .filter(|i| keep_on_prune(i, cutoff))
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(kept, vec!["recent"]);
    }

    #[test]
    fn test_unparseable_date() {
        let cutoff = cutoff(DEFAULT_RETENTION_DAYS, Utc::now());
        let item = FeedItem {
            pub_date: Some("sometime last week".into()),
            ..Default::default()
        };
        assert!(!keep_on_write(&item, cutoff));
        assert!(!keep_on_prune(&item, cutoff));
    }

    #[test]
    fn test_pub_date_counts() {
        let cutoff = cutoff(DEFAULT_RETENTION_DAYS, Utc::now());
        let item = FeedItem {
            pub_date: Some((Utc::now() - Duration::days(2)).to_rfc2822()),
            ..Default::default()
        };
        assert!(keep_on_write(&item, cutoff));
        assert!(keep_on_prune(&item, cutoff));
    }
}
