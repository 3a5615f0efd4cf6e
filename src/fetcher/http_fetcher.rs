use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};

use crate::app::Result;
use crate::fetcher::{FetchResult, Fetcher};

const USER_AGENT: &str = concat!("feedstore/", env!("CARGO_PKG_VERSION"));
const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/feed+json, \
                           application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches feed documents over HTTP, revalidating with the validators
/// stored on the feed.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        let response = self
            .client
            .get(url)
            .headers(conditional_headers(etag, last_modified))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!("{} answered 304", url);
            return Ok(FetchResult::NotModified);
        }

        let response = response.error_for_status()?;
        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);
        let body = response.bytes().await?.to_vec();

        Ok(FetchResult::Content {
            body,
            etag,
            last_modified,
        })
    }
}

/// Request headers for a revalidating GET. Validators that aren't valid
/// header values are skipped, which turns the request into a plain GET.
fn conditional_headers(etag: Option<&str>, last_modified: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

    if let Some(value) = etag.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_NONE_MATCH, value);
    }
    if let Some(value) = last_modified.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_MODIFIED_SINCE, value);
    }
    headers
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditional_headers_carry_validators() {
        let headers = conditional_headers(Some("\"abc\""), Some("Wed, 01 Jan 2025 00:00:00 GMT"));
        assert_eq!(headers[IF_NONE_MATCH], "\"abc\"");
        assert_eq!(headers[IF_MODIFIED_SINCE], "Wed, 01 Jan 2025 00:00:00 GMT");
        assert!(headers.contains_key(ACCEPT));
    }

    #[test]
    fn test_conditional_headers_skip_missing_or_invalid() {
        let headers = conditional_headers(None, Some("bad\nvalue"));
        assert!(!headers.contains_key(IF_NONE_MATCH));
        assert!(!headers.contains_key(IF_MODIFIED_SINCE));
    }

    #[test]
    fn test_header_string() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("W/\"1\""));
        assert_eq!(header_string(&headers, ETAG).as_deref(), Some("W/\"1\""));
        assert_eq!(header_string(&headers, LAST_MODIFIED), None);
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpFetcher::with_timeout(Duration::from_secs(1)).is_ok());
    }
}
