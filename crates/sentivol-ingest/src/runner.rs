//! Run coordinator
//!
//! Drives one ingestion run per category through its phases:
//!
//! ```text
//! Idle -> Fetching -> Normalizing -> Staging -> Merging -> Succeeded
//!                                                       \-> Failed
//! ```
//!
//! Page fetches get a bounded retry budget with exponential backoff; a
//! rate-limit hint from the provider overrides the computed delay. An
//! exhausted budget fails the run as `SourceUnavailable`, rejected
//! credentials fail it immediately as `ConfigurationError`, and a merge
//! failure is `MergeUnavailable`. Dry runs stop after staging.

use std::time::Duration;

use chrono::Utc;
use sentivol_common::{Category, FailureReason, RunSummary};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::adapter::{AdapterError, FetchPage, FetchWindow, SourceAdapter};
use crate::merge::MergeEngine;
use crate::normalize::Normalizer;
use crate::staging::StagingBatch;
use crate::warehouse::Warehouse;

/// Phases a run moves through, in order. Terminal phases are `Succeeded`
/// and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Normalizing,
    Staging,
    Merging,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Normalizing => "normalizing",
            RunPhase::Staging => "staging",
            RunPhase::Merging => "merging",
            RunPhase::Succeeded => "succeeded",
            RunPhase::Failed => "failed",
        }
    }
}

/// Retry budget for page fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per page, including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given zero-based attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// A failed run: the classified reason plus the underlying message.
#[derive(Debug, Error)]
#[error("run failed ({reason}): {message}")]
pub struct RunError {
    pub reason: FailureReason,
    pub message: String,
}

impl RunError {
    fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

pub struct RunCoordinator {
    retry: RetryPolicy,
    /// Hard ceiling on pages per run, against runaway cursors.
    page_cap: usize,
    dry_run: bool,
}

impl RunCoordinator {
    pub fn new(retry: RetryPolicy, page_cap: usize, dry_run: bool) -> Self {
        Self {
            retry,
            page_cap,
            dry_run,
        }
    }

    /// Execute one run. Fetch, normalize and stage page by page, then
    /// merge the whole batch at once.
    pub async fn run(
        &self,
        adapter: &dyn SourceAdapter,
        category: Category,
        window: &FetchWindow,
        normalizer: &Normalizer,
        warehouse: &dyn Warehouse,
    ) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut phase = RunPhase::Idle;
        trace!(%run_id, phase = phase.as_str(), "run created");
        info!(
            %run_id,
            source = %adapter.source(),
            category = %category,
            dry_run = self.dry_run,
            "run starting"
        );

        let mut batch = StagingBatch::new(run_id, category);
        let observed_at = batch.fetched_at();
        let mut fetched = 0usize;
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            phase = RunPhase::Fetching;
            trace!(%run_id, phase = phase.as_str(), pages, "phase transition");
            let page = self
                .fetch_with_retry(adapter, window, page_token.as_deref(), run_id)
                .await?;
            pages += 1;
            fetched += page.items.len();

            phase = RunPhase::Normalizing;
            trace!(%run_id, phase = phase.as_str(), items = page.items.len(), "phase transition");
            let normalized: Vec<_> = page
                .items
                .iter()
                .filter_map(|item| normalizer.normalize(item, observed_at))
                .collect();

            phase = RunPhase::Staging;
            trace!(%run_id, phase = phase.as_str(), "phase transition");
            for record in normalized {
                batch.push(record);
            }

            match page.next_page {
                Some(token) if pages < self.page_cap => page_token = Some(token),
                Some(_) => {
                    warn!(%run_id, pages, "page cap reached, truncating fetch");
                    break;
                },
                None => break,
            }
        }

        let normalized = batch.len();
        let dropped = fetched - normalized;
        debug!(%run_id, fetched, normalized, dropped, pages, phase = phase.as_str(), "staging complete");

        let (inserted, updated) = if self.dry_run {
            info!(%run_id, staged = batch.len(), "dry run, skipping merge");
            (0, 0)
        } else {
            phase = RunPhase::Merging;
            let outcome = MergeEngine::merge(warehouse, batch).await.map_err(|e| {
                warn!(%run_id, phase = phase.as_str(), error = %e, "merge failed");
                RunError::new(FailureReason::MergeUnavailable, e.to_string())
            })?;
            (outcome.inserted, outcome.updated)
        };

        phase = RunPhase::Succeeded;
        let summary = RunSummary {
            run_id,
            category,
            fetched,
            normalized,
            dropped,
            inserted,
            updated,
            started_at,
            completed_at: Utc::now(),
        };
        info!(%run_id, phase = phase.as_str(), %summary, "run finished");
        Ok(summary)
    }

    /// Fetch one page, retrying retryable failures within the budget.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn SourceAdapter,
        window: &FetchWindow,
        page_token: Option<&str>,
        run_id: Uuid,
    ) -> Result<FetchPage, RunError> {
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            match adapter.fetch_page(window, page_token).await {
                Ok(page) => return Ok(page),
                Err(e @ AdapterError::Unauthorized(_)) => {
                    return Err(RunError::new(
                        FailureReason::ConfigurationError,
                        e.to_string(),
                    ));
                },
                Err(e) => {
                    let delay = match &e {
                        AdapterError::RateLimited {
                            retry_after: Some(hint),
                        } => (*hint).min(self.retry.max_backoff),
                        _ => self.retry.backoff(attempt),
                    };
                    last_error = e.to_string();
                    warn!(
                        %run_id,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "page fetch failed, backing off"
                    );
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        Err(RunError::new(FailureReason::SourceUnavailable, last_error))
    }
}
