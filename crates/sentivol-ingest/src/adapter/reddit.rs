//! Reddit public-listing adapter
//!
//! Reads `/r/{subreddit}/new.json` without authentication, one subreddit
//! per page. The listing only exposes the newest posts, so the window is
//! applied to each post's `created_utc` here; keyword relevance is the
//! normalizer's job.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use sentivol_common::Source;
use tracing::debug;

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const LISTING_LIMIT: usize = 100;

pub struct RedditAdapter {
    client: Client,
    base_url: String,
    subreddits: Vec<String>,
}

impl RedditAdapter {
    pub fn new(subreddits: Vec<String>, timeout_secs: u64) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            subreddits,
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn source(&self) -> Source {
        Source::Reddit
    }

    /// Cursor: subreddit index into the configured list.
    async fn fetch_page(
        &self,
        window: &FetchWindow,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let idx: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let Some(subreddit) = self.subreddits.get(idx) else {
            return Ok(FetchPage::last(vec![]));
        };

        let url = format!("{}/r/{}/new.json", self.base_url, subreddit);
        let params = [
            ("limit", LISTING_LIMIT.to_string()),
            ("raw_json", "1".to_string()),
        ];

        let body = get_json(&self.client, &url, &params).await?;
        let children = body["data"]["children"]
            .as_array()
            .ok_or_else(|| AdapterError::Malformed("listing missing data.children".into()))?;

        let items: Vec<RawItem> = children
            .iter()
            .filter_map(|c| {
                let post = &c["data"];
                let created = post["created_utc"].as_f64()?;
                let ts = DateTime::from_timestamp(created as i64, 0)?;
                (ts >= window.start && ts <= window.end)
                    .then(|| RawItem::new(Source::Reddit, post.clone()))
            })
            .collect();

        debug!(
            subreddit = %subreddit,
            listed = children.len(),
            in_window = items.len(),
            "Reddit listing fetched"
        );

        let next_page = (idx + 1 < self.subreddits.len()).then(|| (idx + 1).to_string());
        Ok(FetchPage { items, next_page })
    }
}
