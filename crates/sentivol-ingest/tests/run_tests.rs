//! Run-coordinator scenarios against a scripted adapter
//!
//! The scripted adapter replays a fixed sequence of page results, which
//! makes retry classification and the end-of-run counts deterministic.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sentivol_common::{Category, FailureReason, Source};
use sentivol_ingest::adapter::{
    AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter,
};
use sentivol_ingest::normalize::Normalizer;
use sentivol_ingest::runner::{RetryPolicy, RunCoordinator};
use sentivol_ingest::warehouse::MemWarehouse;
use serde_json::json;

struct ScriptedAdapter {
    responses: Mutex<VecDeque<Result<FetchPage, AdapterError>>>,
}

impl ScriptedAdapter {
    fn new(responses: Vec<Result<FetchPage, AdapterError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source(&self) -> Source {
        Source::NewsApi
    }

    async fn fetch_page(
        &self,
        _window: &FetchWindow,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .unwrap_or_else(|| Ok(FetchPage::last(vec![])))
    }
}

fn article_item(i: usize) -> RawItem {
    RawItem::new(
        Source::NewsApi,
        json!({
            "title": format!("Brent futures slip on inventories, update {}", i),
            "description": "Crude benchmarks fell.",
            "url": format!("https://news.example/{}", i),
            "publishedAt": "2026-08-17T09:15:00Z"
        }),
    )
}

fn off_topic_item() -> RawItem {
    RawItem::new(
        Source::NewsApi,
        json!({
            "title": "Ten easy weeknight dinners",
            "description": "Pasta and more.",
            "url": "https://news.example/dinners"
        }),
    )
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
    }
}

fn normalizer() -> Normalizer {
    Normalizer::new(vec!["crude".into(), "wti".into()]).unwrap()
}

fn page(items: Vec<RawItem>, next: Option<&str>) -> FetchPage {
    FetchPage {
        items,
        next_page: next.map(String::from),
    }
}

#[tokio::test]
async fn test_run_recovers_from_rate_limits_and_counts_correctly() {
    // Two rate limits, then two pages: 3 articles, one of them off topic.
    let adapter = ScriptedAdapter::new(vec![
        Err(AdapterError::RateLimited {
            retry_after: Some(Duration::from_millis(1)),
        }),
        Err(AdapterError::RateLimited { retry_after: None }),
        Ok(page(vec![article_item(1), off_topic_item()], Some("next"))),
        Ok(page(vec![article_item(2)], None)),
    ]);
    let warehouse = MemWarehouse::new();
    let coordinator = RunCoordinator::new(fast_retry(3), 100, false);

    let summary = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &warehouse,
        )
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.normalized, 2);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(warehouse.rows(Category::News).await.len(), 2);
}

#[tokio::test]
async fn test_exhausted_retry_budget_is_source_unavailable() {
    let adapter = ScriptedAdapter::new(vec![
        Err(AdapterError::Transient("boom".into())),
        Err(AdapterError::Transient("boom".into())),
        Err(AdapterError::Transient("boom".into())),
    ]);
    let coordinator = RunCoordinator::new(fast_retry(3), 100, false);

    let err = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &MemWarehouse::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason, FailureReason::SourceUnavailable);
}

#[tokio::test]
async fn test_unauthorized_fails_immediately_as_configuration_error() {
    let adapter = ScriptedAdapter::new(vec![
        Err(AdapterError::Unauthorized("HTTP 401".into())),
        // Never reached: no retry on bad credentials
        Ok(page(vec![article_item(1)], None)),
    ]);
    let coordinator = RunCoordinator::new(fast_retry(3), 100, false);

    let err = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &MemWarehouse::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason, FailureReason::ConfigurationError);

    let remaining = adapter.responses.lock().unwrap().len();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_merge_failure_is_merge_unavailable() {
    let adapter = ScriptedAdapter::new(vec![Ok(page(vec![article_item(1)], None))]);
    let warehouse = MemWarehouse::new();
    warehouse.fail_after(0).await;
    let coordinator = RunCoordinator::new(fast_retry(3), 100, false);

    let err = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &warehouse,
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason, FailureReason::MergeUnavailable);
}

#[tokio::test]
async fn test_dry_run_skips_the_merge() {
    let adapter = ScriptedAdapter::new(vec![Ok(page(vec![article_item(1)], None))]);
    let warehouse = MemWarehouse::new();
    let coordinator = RunCoordinator::new(fast_retry(3), 100, true);

    let summary = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &warehouse,
        )
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.normalized, 1);
    assert_eq!(summary.inserted, 0);
    assert!(warehouse.rows(Category::News).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_key_across_pages_lands_once() {
    // Same URL appears on two pages; fetched counts both, storage one.
    let adapter = ScriptedAdapter::new(vec![
        Ok(page(vec![article_item(7)], Some("next"))),
        Ok(page(vec![article_item(7)], None)),
    ]);
    let warehouse = MemWarehouse::new();
    let coordinator = RunCoordinator::new(fast_retry(3), 100, false);

    let summary = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &warehouse,
        )
        .await
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.normalized, 2);
    assert_eq!(summary.inserted, 1);
    assert_eq!(warehouse.rows(Category::News).await.len(), 1);
}

#[tokio::test]
async fn test_page_cap_truncates_runaway_cursors() {
    // Adapter always promises another page
    let adapter = ScriptedAdapter::new(
        (0..10)
            .map(|i| Ok(page(vec![article_item(i)], Some("more"))))
            .collect(),
    );
    let warehouse = MemWarehouse::new();
    let coordinator = RunCoordinator::new(fast_retry(3), 3, false);

    let summary = coordinator
        .run(
            &adapter,
            Category::News,
            &FetchWindow::last_days(7),
            &normalizer(),
            &warehouse,
        )
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
}
