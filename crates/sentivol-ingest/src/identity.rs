//! Identity key derivation
//!
//! Every canonical record carries a deterministic `identity_key` derived
//! purely from its natural fields. No network, no table lookups: the same
//! logical item always yields the same key no matter when or how often it
//! is computed, which is what makes insert-if-absent idempotent.
//!
//! Key policies by category:
//!
//! - provider-assigned permanent id -> `"{source}:{id}"`
//! - content without a stable id   -> truncated sha256 over normalized fields
//! - macro observations            -> `"{series_id}:{period}"`
//! - market bars                   -> `"{ticker}:{bar_ts}:{interval}"`

use chrono::{DateTime, NaiveDate, SecondsFormat, Timelike, Utc};
use sentivol_common::Source;
use sha2::{Digest, Sha256};

/// Truncated hex sha256 of an arbitrary string. 32 hex chars (128 bits) is
/// plenty for collision resistance at this volume and keeps keys readable.
pub fn stable_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Key for items carrying a provider-assigned permanent id.
pub fn provider_key(source: Source, provider_id: &str) -> String {
    format!("{}:{}", source, provider_id)
}

/// Key for articles: prefer a hash of the URL, fall back to title plus
/// publication time when the provider omits one.
pub fn article_key(url: Option<&str>, title: &str, published_at: Option<DateTime<Utc>>) -> String {
    match url {
        Some(u) if !u.is_empty() => stable_hash(u),
        _ => {
            let ts = published_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();
            stable_hash(&format!("{}|{}", title, ts))
        },
    }
}

/// Key for feed items without any provider id (RSS). Hashes a normalized
/// tuple of title, publication time truncated to the minute, and URL so
/// trivial formatting or casing differences between fetches do not change
/// the key.
pub fn feed_key(title: &str, published_at: Option<DateTime<Utc>>, url: &str) -> String {
    let norm_title = title.trim().to_lowercase();
    let norm_time = published_at
        .map(|t| {
            t.with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t)
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        })
        .unwrap_or_default();
    stable_hash(&format!("{}|{}|{}", norm_title, norm_time, url.trim()))
}

/// Key for macro observations: one row per series per reporting period.
/// Re-fetches of a revised value update the existing row instead of
/// creating a new one.
pub fn series_key(series_id: &str, period: NaiveDate) -> String {
    format!("{}:{}", series_id, period)
}

/// Key for market bars.
pub fn bar_key(ticker: &str, bar_ts: DateTime<Utc>, interval: &str) -> String {
    format!(
        "{}:{}:{}",
        ticker,
        bar_ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        interval
    )
}
