//! NewsAPI adapter (newsapi.org /v2/everything)
//!
//! NewsAPI caps query length, so the crude-oil core terms are packed into
//! as few queries as fit under the cap, each ANDed with the full context
//! term group. Pagination walks `page` within each query up to the
//! provider-reported `totalResults`, then moves to the next query.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use sentivol_common::Source;
use tracing::debug;

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2/everything";

const CORE_TERMS: &[&str] = &[
    "\"wti\"",
    "\"brent\"",
    "\"crude oil\"",
    "petroleum",
    "\"opec\"",
    "\"opec+\"",
    "nymex",
    "\"ice brent\"",
    "eia",
];

const CTX_TERMS: &[&str] = &[
    "price",
    "prices",
    "futures",
    "spot",
    "inventory",
    "production",
    "demand",
    "supply",
    "\"rig count\"",
    "sanctions",
    "outage",
    "pipeline",
    "refinery",
];

/// Keep each query string under the provider's URL length limit.
const MAX_QUERY_LEN: usize = 480;

pub struct NewsApiAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    queries: Vec<String>,
    page_size: usize,
    max_pages_per_query: usize,
}

impl NewsApiAdapter {
    pub fn new(
        api_key: &str,
        page_size: usize,
        max_pages_per_query: usize,
        timeout_secs: u64,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            queries: build_queries(CORE_TERMS, CTX_TERMS, MAX_QUERY_LEN),
            page_size,
            max_pages_per_query,
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn build_query(core: &[&str], ctx: &[&str]) -> String {
    format!("({}) AND ({})", core.join(" OR "), ctx.join(" OR "))
}

/// Pack core terms into query strings that stay under `max_len` once
/// combined with the full context group.
fn build_queries(core_terms: &[&str], ctx_terms: &[&str], max_len: usize) -> Vec<String> {
    let mut queries = Vec::new();
    let mut bucket: Vec<&str> = Vec::new();

    for term in core_terms {
        let mut test = bucket.clone();
        test.push(term);
        if build_query(&test, ctx_terms).len() <= max_len {
            bucket = test;
        } else {
            if !bucket.is_empty() {
                queries.push(build_query(&bucket, ctx_terms));
            }
            bucket = vec![term];
        }
    }
    if !bucket.is_empty() {
        queries.push(build_query(&bucket, ctx_terms));
    }
    queries
}

/// Cursor: "{query_index}:{page}".
fn parse_cursor(token: Option<&str>) -> (usize, usize) {
    token
        .and_then(|t| {
            let (qi, page) = t.split_once(':')?;
            Some((qi.parse().ok()?, page.parse().ok()?))
        })
        .unwrap_or((0, 1))
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    fn source(&self) -> Source {
        Source::NewsApi
    }

    async fn fetch_page(
        &self,
        window: &FetchWindow,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let (query_idx, page) = parse_cursor(page_token);
        let Some(q) = self.queries.get(query_idx) else {
            return Ok(FetchPage::last(vec![]));
        };

        let params = [
            ("q", q.clone()),
            ("language", "en".to_string()),
            (
                "from",
                window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("to", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("sortBy", "relevancy".to_string()),
            ("searchIn", "title,description".to_string()),
            ("pageSize", self.page_size.to_string()),
            ("page", page.to_string()),
            ("apiKey", self.api_key.clone()),
        ];

        let body = get_json(&self.client, &self.base_url, &params).await?;

        // NewsAPI also reports failures in-band with HTTP 200.
        if body["status"].as_str() == Some("error") {
            let code = body["code"].as_str().unwrap_or("unknown");
            let message = body["message"].as_str().unwrap_or("").to_string();
            return Err(match code {
                "rateLimited" => AdapterError::RateLimited { retry_after: None },
                "apiKeyInvalid" | "apiKeyMissing" | "apiKeyDisabled" | "unauthorized" => {
                    AdapterError::Unauthorized(message)
                },
                _ => AdapterError::Transient(format!("{}: {}", code, message)),
            });
        }

        let total_results = body["totalResults"].as_u64().unwrap_or(0) as usize;
        let articles = body["articles"].as_array().cloned().unwrap_or_default();

        debug!(
            query_idx,
            page,
            got = articles.len(),
            total_results,
            "NewsAPI page fetched"
        );

        let items = articles
            .into_iter()
            .map(|a| RawItem::new(Source::NewsApi, a))
            .collect();

        let api_pages = total_results.div_ceil(self.page_size.max(1));
        let pages_for_query = api_pages.min(self.max_pages_per_query);

        let next_page = if page < pages_for_query {
            Some(format!("{}:{}", query_idx, page + 1))
        } else if query_idx + 1 < self.queries.len() {
            Some(format!("{}:1", query_idx + 1))
        } else {
            None
        };

        Ok(FetchPage { items, next_page })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_queries_respects_length_cap() {
        let queries = build_queries(CORE_TERMS, CTX_TERMS, MAX_QUERY_LEN);
        assert!(!queries.is_empty());
        for q in &queries {
            assert!(q.len() <= MAX_QUERY_LEN, "query too long: {}", q.len());
            assert!(q.contains(" AND "));
        }
    }

    #[test]
    fn test_build_queries_covers_all_core_terms() {
        let queries = build_queries(CORE_TERMS, CTX_TERMS, MAX_QUERY_LEN);
        let joined = queries.join(" ");
        for term in CORE_TERMS {
            assert!(joined.contains(term), "missing core term {}", term);
        }
    }

    #[test]
    fn test_parse_cursor() {
        assert_eq!(parse_cursor(None), (0, 1));
        assert_eq!(parse_cursor(Some("2:5")), (2, 5));
        assert_eq!(parse_cursor(Some("garbage")), (0, 1));
    }
}
