//! Yahoo Finance chart adapter (daily OHLCV bars)
//!
//! Fetches the `/v8/finance/chart/{ticker}` endpoint for the window span
//! and emits one item per bar timestamp. Bars where every price field is
//! null (exchange holidays) are still emitted here; the normalizer drops
//! them. Single page.

use async_trait::async_trait;
use reqwest::Client;
use sentivol_common::Source;
use serde_json::json;
use tracing::debug;

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const INTERVAL: &str = "1d";

pub struct MarketAdapter {
    client: Client,
    base_url: String,
    ticker: String,
}

impl MarketAdapter {
    pub fn new(ticker: &str, timeout_secs: u64) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            ticker: ticker.to_string(),
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for MarketAdapter {
    fn source(&self) -> Source {
        Source::YahooFinance
    }

    async fn fetch_page(
        &self,
        window: &FetchWindow,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let days = (window.end - window.start).num_days().max(1);
        let url = format!("{}/v8/finance/chart/{}", self.base_url, self.ticker);
        let params = [
            ("range", format!("{}d", days)),
            ("interval", INTERVAL.to_string()),
        ];

        let body = get_json(&self.client, &url, &params).await?;

        if let Some(err) = body["chart"]["error"].as_object() {
            let desc = err
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("unknown chart error");
            return Err(AdapterError::Transient(desc.to_string()));
        }

        let result = &body["chart"]["result"][0];
        let timestamps = result["timestamp"]
            .as_array()
            .ok_or_else(|| AdapterError::Malformed("chart result missing timestamps".into()))?;
        let quote = &result["indicators"]["quote"][0];

        let items: Vec<RawItem> = timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let ts = ts.as_i64()?;
                Some(RawItem::new(
                    Source::YahooFinance,
                    json!({
                        "ticker": self.ticker,
                        "ts": ts,
                        "interval": INTERVAL,
                        "open": quote["open"][i],
                        "high": quote["high"][i],
                        "low": quote["low"][i],
                        "close": quote["close"][i],
                        "volume": quote["volume"][i],
                    }),
                ))
            })
            .collect();

        debug!(ticker = %self.ticker, bars = items.len(), "chart fetched");

        Ok(FetchPage::last(items))
    }
}
