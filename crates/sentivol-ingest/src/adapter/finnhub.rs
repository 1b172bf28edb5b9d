//! Finnhub general-news adapter
//!
//! Finnhub's `/api/v1/news?category=general` endpoint returns a single
//! snapshot with no server-side time filter, so the adapter trims the
//! snapshot to the fetch window on the item `datetime` field itself.
//! Always a single page.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use sentivol_common::Source;
use tracing::debug;

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://finnhub.io";

pub struct FinnhubAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FinnhubAdapter {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for FinnhubAdapter {
    fn source(&self) -> Source {
        Source::Finnhub
    }

    async fn fetch_page(
        &self,
        window: &FetchWindow,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let url = format!("{}/api/v1/news", self.base_url);
        let params = [
            ("category", "general".to_string()),
            ("token", self.api_key.clone()),
        ];

        let body = get_json(&self.client, &url, &params).await?;
        let articles = body
            .as_array()
            .ok_or_else(|| AdapterError::Malformed("expected a JSON array of articles".into()))?;

        let items: Vec<RawItem> = articles
            .iter()
            .filter(|a| {
                a["datetime"]
                    .as_i64()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .is_some_and(|ts| ts >= window.start && ts <= window.end)
            })
            .map(|a| RawItem::new(Source::Finnhub, a.clone()))
            .collect();

        debug!(
            total = articles.len(),
            in_window = items.len(),
            "Finnhub snapshot fetched"
        );

        Ok(FetchPage::last(items))
    }
}
