//! Source adapter interface
//!
//! One adapter per upstream provider. An adapter's only job is to page
//! through raw provider payloads for a fetch window; it keeps no state
//! between invocations beyond its HTTP client, and it never interprets
//! payload contents (that is the normalizer's job).
//!
//! Provider failures are surfaced through the distinguished
//! [`AdapterError`] taxonomy so the run coordinator can decide what is
//! retryable. An empty page is success, not failure.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use sentivol_common::Source;
use thiserror::Error;

pub mod finnhub;
pub mod fred;
pub mod market;
pub mod newsapi;
pub mod reddit;
pub mod rss;
pub mod youtube;

pub use finnhub::FinnhubAdapter;
pub use fred::FredAdapter;
pub use market::MarketAdapter;
pub use newsapi::NewsApiAdapter;
pub use reddit::RedditAdapter;
pub use rss::YahooRssAdapter;
pub use youtube::YouTubeAdapter;

const USER_AGENT: &str = "sentivol-ingest/0.1 (+https://github.com/sentivol/sentivol)";

/// Provider-specific payload fragment, consumed immediately by the
/// normalizer.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub source: Source,
    pub value: serde_json::Value,
}

impl RawItem {
    pub fn new(source: Source, value: serde_json::Value) -> Self {
        Self { source, value }
    }
}

/// Time window a fetch is parameterized by. Full-refresh adapters (RSS)
/// ignore the bounds and return the current snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - ChronoDuration::hours(hours),
            end,
        }
    }

    pub fn last_days(days: i64) -> Self {
        Self::last_hours(days * 24)
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Utc::now(),
        }
    }
}

/// One page of raw items. Pagination terminates when `next_page` is absent.
#[derive(Debug, Default)]
pub struct FetchPage {
    pub items: Vec<RawItem>,
    pub next_page: Option<String>,
}

impl FetchPage {
    pub fn last(items: Vec<RawItem>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}

/// Error taxonomy for adapter fetches.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Provider signalled a quota/rate limit. Retryable after backoff;
    /// `retry_after` carries the provider hint when one was given.
    #[error("rate limited by provider (retry-after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Credentials rejected. Never retryable.
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// Timeout, connection failure, or server-side error. Retryable.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Response body could not be decoded. Retried within the fetch
    /// budget in case the payload was truncated in transit.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AdapterError::Unauthorized(_))
    }
}

/// Pluggable per-provider fetch contract.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider behind this adapter.
    fn source(&self) -> Source;

    /// Fetch one page of raw items for the window. `page_token` of `None`
    /// requests the first page; adapters encode their own cursor format in
    /// the returned `next_page`. Must return an empty page (not an error)
    /// when the provider legitimately has no new data.
    async fn fetch_page(
        &self,
        window: &FetchWindow,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError>;
}

/// Shared HTTP client with bounded timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AdapterError::Transient(e.to_string()))
}

/// GET a JSON document, mapping HTTP conditions onto the error taxonomy.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<serde_json::Value, AdapterError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(map_send_error)?;
    let response = check_status(response)?;
    response
        .json()
        .await
        .map_err(|e| AdapterError::Malformed(e.to_string()))
}

/// GET a raw text document (RSS feeds) with the same status mapping.
pub(crate) async fn get_text(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, AdapterError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(map_send_error)?;
    let response = check_status(response)?;
    response
        .text()
        .await
        .map_err(|e| AdapterError::Malformed(e.to_string()))
}

fn map_send_error(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::Transient(format!("request timed out: {}", e))
    } else {
        AdapterError::Transient(e.to_string())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AdapterError::RateLimited { retry_after });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdapterError::Unauthorized(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        return Err(AdapterError::Transient(format!("HTTP {}", status)));
    }
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(AdapterError::RateLimited { retry_after: None }.is_retryable());
        assert!(AdapterError::Transient("boom".into()).is_retryable());
        assert!(AdapterError::Malformed("truncated".into()).is_retryable());
        assert!(!AdapterError::Unauthorized("HTTP 401".into()).is_retryable());
    }

    #[test]
    fn test_window_bounds() {
        let window = FetchWindow::last_hours(6);
        assert!(window.start < window.end);
        assert_eq!((window.end - window.start).num_hours(), 6);
    }
}
