//! Adapter behavior against mocked providers
//!
//! Covers pagination cursors, window filtering, and the mapping from
//! provider HTTP conditions onto the adapter error taxonomy.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use sentivol_ingest::adapter::{
    AdapterError, FetchWindow, FinnhubAdapter, FredAdapter, MarketAdapter, NewsApiAdapter,
    RedditAdapter, SourceAdapter, YahooRssAdapter,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> FetchWindow {
    FetchWindow::last_days(7)
}

fn newsapi_body(count: usize, total: usize) -> serde_json::Value {
    let articles: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "title": format!("Brent futures slip, article {}", i),
                "description": "Crude inventories rose.",
                "url": format!("https://news.example/{}", i),
                "publishedAt": "2026-08-17T09:15:00Z"
            })
        })
        .collect();
    json!({ "status": "ok", "totalResults": total, "articles": articles })
}

#[tokio::test]
async fn test_newsapi_paginates_within_and_across_queries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body(10, 15)))
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new("test-key", 10, 10, 5)
        .unwrap()
        .with_base_url(server.uri());

    // 15 results at page size 10 -> two pages for query 0
    let first = adapter.fetch_page(&window(), None).await.unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.next_page.as_deref(), Some("0:2"));

    // Page 2 is the last page of query 0; cursor moves to query 1 if one
    // exists, otherwise pagination ends.
    let second = adapter.fetch_page(&window(), Some("0:2")).await.unwrap();
    match second.next_page.as_deref() {
        Some(token) => assert!(token.ends_with(":1")),
        None => {},
    }
}

#[tokio::test]
async fn test_newsapi_caps_pages_per_query() {
    let server = MockServer::start().await;
    // Provider claims far more results than the per-query cap allows
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body(10, 10_000)))
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new("test-key", 10, 3, 5)
        .unwrap()
        .with_base_url(server.uri());

    let page = adapter.fetch_page(&window(), Some("0:3")).await.unwrap();
    // At the cap, the cursor must not stay on this query
    assert_ne!(page.next_page.as_deref(), Some("0:4"));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let adapter = NewsApiAdapter::new("test-key", 10, 10, 5)
        .unwrap()
        .with_base_url(server.uri());

    match adapter.fetch_page(&window(), None).await {
        Err(AdapterError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(17)));
        },
        other => panic!("expected RateLimited, got {:?}", other.map(|p| p.items.len())),
    }
}

#[tokio::test]
async fn test_unauthorized_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let adapter = FinnhubAdapter::new("bad-key", 5)
        .unwrap()
        .with_base_url(server.uri());

    let err = adapter.fetch_page(&window(), None).await.unwrap_err();
    assert!(matches!(err, AdapterError::Unauthorized(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_finnhub_filters_to_window() {
    let server = MockServer::start().await;
    let now = chrono::Utc::now().timestamp();
    let body = json!([
        { "id": 1, "headline": "in window", "summary": "", "datetime": now - 3600 },
        { "id": 2, "headline": "ancient", "summary": "", "datetime": now - 86_400 * 30 }
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v1/news"))
        .and(query_param("category", "general"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let adapter = FinnhubAdapter::new("key", 5)
        .unwrap()
        .with_base_url(server.uri());

    let page = adapter.fetch_page(&window(), None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.next_page.is_none());
    assert_eq!(page.items[0].value["headline"], "in window");
}

#[tokio::test]
async fn test_empty_provider_page_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let adapter = FinnhubAdapter::new("key", 5)
        .unwrap()
        .with_base_url(server.uri());

    let page = adapter.fetch_page(&window(), None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_page.is_none());
}

#[tokio::test]
async fn test_fred_walks_series_and_annotates_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "CPIAUCSL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "units": "lin",
            "observations": [
                { "date": "2026-07-01", "value": "321.4", "realtime_start": "2026-08-12" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "UNRATE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "units": "lin",
            "observations": []
        })))
        .mount(&server)
        .await;

    let adapter = FredAdapter::new(
        "key",
        vec!["CPIAUCSL".to_string(), "UNRATE".to_string()],
        5,
    )
    .unwrap()
    .with_base_url(server.uri());

    let first = adapter.fetch_page(&window(), None).await.unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].value["series_id"], "CPIAUCSL");
    assert_eq!(first.items[0].value["units"], "lin");
    assert_eq!(first.next_page.as_deref(), Some("1"));

    let second = adapter.fetch_page(&window(), Some("1")).await.unwrap();
    assert!(second.items.is_empty());
    assert!(second.next_page.is_none());
}

#[tokio::test]
async fn test_reddit_cursor_walks_subreddits() {
    let server = MockServer::start().await;
    let now = chrono::Utc::now().timestamp() as f64;
    Mock::given(method("GET"))
        .and(path("/r/energy/new.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "children": [
                { "data": { "id": "p1", "title": "WTI up", "created_utc": now - 60.0 } },
                { "data": { "id": "p2", "title": "old", "created_utc": now - 86_400.0 * 30.0 } }
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/oil/new.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "children": [] }
        })))
        .mount(&server)
        .await;

    let adapter = RedditAdapter::new(vec!["energy".to_string(), "oil".to_string()], 5)
        .unwrap()
        .with_base_url(server.uri());

    let first = adapter.fetch_page(&window(), None).await.unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].value["id"], "p1");
    assert_eq!(first.next_page.as_deref(), Some("1"));

    let second = adapter.fetch_page(&window(), Some("1")).await.unwrap();
    assert!(second.items.is_empty());
    assert!(second.next_page.is_none());
}

#[tokio::test]
async fn test_rss_snapshot_parses_feed_items() {
    let server = MockServer::start().await;
    let feed = r#"<?xml version="1.0"?><rss version="2.0"><channel>
        <item>
          <title>Oil climbs on supply worries</title>
          <description>Crude futures rose.</description>
          <link>https://finance.yahoo.com/news/oil-climbs</link>
          <pubDate>Mon, 17 Aug 2026 09:15:00 +0000</pubDate>
        </item>
    </channel></rss>"#;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;

    let adapter = YahooRssAdapter::new("CL=F", 5)
        .unwrap()
        .with_base_url(server.uri());

    let page = adapter.fetch_page(&window(), None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].value["title"], "Oil climbs on supply worries");
    assert!(page.next_page.is_none());
}

#[tokio::test]
async fn test_market_chart_flattens_bars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/CL=F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "error": null,
                "result": [{
                    "timestamp": [1755993600, 1756080000],
                    "indicators": { "quote": [{
                        "open":   [71.2, null],
                        "high":   [72.9, null],
                        "low":    [70.8, null],
                        "close":  [72.0, null],
                        "volume": [350_000.0, null]
                    }]}
                }]
            }
        })))
        .mount(&server)
        .await;

    let adapter = MarketAdapter::new("CL=F", 5)
        .unwrap()
        .with_base_url(server.uri());

    let page = adapter.fetch_page(&window(), None).await.unwrap();
    // Both bars come through; the all-null one is the normalizer's problem
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].value["ticker"], "CL=F");
    assert_eq!(page.items[0].value["close"], 72.0);
    assert!(page.items[1].value["close"].is_null());
    assert!(page.next_page.is_none());
}

#[tokio::test]
async fn test_malformed_body_maps_to_malformed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let adapter = FinnhubAdapter::new("key", 5)
        .unwrap()
        .with_base_url(server.uri());

    let err = adapter.fetch_page(&window(), None).await.unwrap_err();
    assert!(matches!(err, AdapterError::Malformed(_)));
    assert!(err.is_retryable());
}
