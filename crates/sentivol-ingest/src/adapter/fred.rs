//! FRED macro-series adapter
//!
//! One configured series per page. Each observation object is annotated
//! with its `series_id` and the series `units` so the normalizer does not
//! need the cursor to interpret it. FRED publishes revisions in place;
//! `realtime_start` is carried through as the revision marker.

use async_trait::async_trait;
use reqwest::Client;
use sentivol_common::Source;
use tracing::debug;

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org";

pub struct FredAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    series: Vec<String>,
}

impl FredAdapter {
    pub fn new(api_key: &str, series: Vec<String>, timeout_secs: u64) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            series,
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for FredAdapter {
    fn source(&self) -> Source {
        Source::Fred
    }

    /// Cursor: series index into the configured list.
    async fn fetch_page(
        &self,
        window: &FetchWindow,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let idx: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let Some(series_id) = self.series.get(idx) else {
            return Ok(FetchPage::last(vec![]));
        };

        let url = format!("{}/fred/series/observations", self.base_url);
        let params = [
            ("series_id", series_id.clone()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            (
                "observation_start",
                window.start.date_naive().to_string(),
            ),
        ];

        let body = get_json(&self.client, &url, &params).await?;
        let observations = body["observations"]
            .as_array()
            .ok_or_else(|| AdapterError::Malformed("response missing observations".into()))?;

        let units = body["units"].as_str().unwrap_or("lin").to_string();

        let items: Vec<RawItem> = observations
            .iter()
            .map(|obs| {
                let mut value = obs.clone();
                if let Some(map) = value.as_object_mut() {
                    map.insert("series_id".to_string(), series_id.clone().into());
                    map.insert("units".to_string(), units.clone().into());
                }
                RawItem::new(Source::Fred, value)
            })
            .collect();

        debug!(
            series_id = %series_id,
            observations = items.len(),
            "FRED series fetched"
        );

        let next_page = (idx + 1 < self.series.len()).then(|| (idx + 1).to_string());
        Ok(FetchPage { items, next_page })
    }
}
