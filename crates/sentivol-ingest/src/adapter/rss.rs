//! Yahoo Finance RSS headline adapter
//!
//! Pulls the headline feed for a ticker and flattens each `<item>` into a
//! JSON object of its text children. RSS is a rolling snapshot with no
//! pagination and no usable time filter, so this adapter is full-refresh:
//! the window is ignored and dedup happens downstream on the feed key.

use async_trait::async_trait;
use reqwest::Client;
use sentivol_common::Source;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{build_client, get_text, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://feeds.finance.yahoo.com/rss/2.0/headline";

pub struct YahooRssAdapter {
    client: Client,
    base_url: String,
    ticker: String,
}

impl YahooRssAdapter {
    pub fn new(ticker: &str, timeout_secs: u64) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            ticker: ticker.to_string(),
        })
    }

    /// Override the feed endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// RSS 2.0 feed root
#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    link: String,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
}

fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, AdapterError> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| AdapterError::Malformed(format!("invalid feed XML: {}", e)))?;
    Ok(rss.channel.items)
}

#[async_trait]
impl SourceAdapter for YahooRssAdapter {
    fn source(&self) -> Source {
        Source::YahooRss
    }

    async fn fetch_page(
        &self,
        _window: &FetchWindow,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let params = [
            ("s", self.ticker.clone()),
            ("region", "US".to_string()),
            ("lang", "en-US".to_string()),
        ];
        let body = get_text(&self.client, &self.base_url, &params).await?;
        let feed_items = parse_feed(&body)?;

        debug!(
            ticker = %self.ticker,
            items = feed_items.len(),
            "RSS feed fetched"
        );

        let items = feed_items
            .into_iter()
            .map(|i| {
                RawItem::new(
                    Source::YahooRss,
                    json!({
                        "title": i.title,
                        "description": i.description,
                        "link": i.link,
                        "pub_date": i.pub_date,
                    }),
                )
            })
            .collect();

        Ok(FetchPage::last(items))
    }
}
