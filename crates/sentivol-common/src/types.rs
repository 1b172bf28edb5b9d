//! Common types used across SentiVol
//!
//! A [`CanonicalRecord`] is the single shape every provider payload is
//! normalized into before staging and merge. The `identity_key` is the
//! dedup handle: it must be stable across repeated fetches of the same
//! logical item.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upstream provider a record was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    NewsApi,
    Finnhub,
    YahooRss,
    Reddit,
    YouTube,
    Fred,
    YahooFinance,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::NewsApi => "newsapi",
            Source::Finnhub => "finnhub",
            Source::YahooRss => "yahoo_rss",
            Source::Reddit => "reddit",
            Source::YouTube => "youtube",
            Source::Fred => "fred",
            Source::YahooFinance => "yahoo_finance",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data category, one durable table per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    News,
    SocialPost,
    VideoComment,
    MacroSeries,
    MarketBar,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::SocialPost => "social_post",
            Category::VideoComment => "video_comment",
            Category::MacroSeries => "macro_series",
            Category::MarketBar => "market_bar",
        }
    }

    /// Durable table backing this category.
    pub fn table(&self) -> &'static str {
        match self {
            Category::News => "news_articles",
            Category::SocialPost => "social_posts",
            Category::VideoComment => "video_comments",
            Category::MacroSeries => "macro_observations",
            Category::MarketBar => "market_bars",
        }
    }

    /// Whether rows in this category may legitimately be revised after
    /// first ingestion. Only macro observations get agency revisions;
    /// every other category is insert-only once a key exists.
    pub fn revisable(&self) -> bool {
        matches!(self, Category::MacroSeries)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category-specific structured fields of a canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// News article (NewsAPI, Finnhub, Yahoo RSS)
    Article {
        title: String,
        description: String,
        url: Option<String>,
        author: Option<String>,
    },
    /// Social post (Reddit)
    Post {
        subreddit: String,
        author: Option<String>,
        title: String,
        body: String,
        url: String,
        score: i64,
        num_comments: i64,
    },
    /// Video comment (YouTube)
    Comment {
        video_id: String,
        keyword: String,
        author: Option<String>,
        text: String,
        like_count: i64,
    },
    /// Macro series observation (FRED)
    Observation {
        series_id: String,
        period: NaiveDate,
        value: f64,
        units: Option<String>,
    },
    /// OHLCV market bar (Yahoo Finance)
    Bar {
        ticker: String,
        interval: String,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
        volume: Option<f64>,
    },
}

/// Common shape every provider item is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Provider this record was fetched from
    pub source: Source,

    /// Category (and therefore durable table) this record belongs to
    pub category: Category,

    /// Deterministic dedup key, unique within the category
    pub identity_key: String,

    /// When this record was first seen by an ingestion run
    pub observed_at: DateTime<Utc>,

    /// Timestamp the record pertains to; doubles as the revision marker
    /// for revisable categories. May be absent for slow-changing sources.
    pub event_time: Option<DateTime<Utc>>,

    /// Category-specific fields
    pub payload: Payload,
}

/// Counts emitted by a completed ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub category: Category,
    pub fetched: usize,
    pub normalized: usize,
    pub dropped: usize,
    pub inserted: u64,
    pub updated: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run={} category={} fetched={} normalized={} dropped={} inserted={} updated={} duration={:.2}s",
            self.run_id,
            self.category,
            self.fetched,
            self.normalized,
            self.dropped,
            self.inserted,
            self.updated,
            self.duration_secs()
        )
    }
}
