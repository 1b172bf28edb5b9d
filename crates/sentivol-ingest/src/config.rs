//! Ingestion configuration
//!
//! All knobs come from the environment (a `.env` file is loaded by the
//! binary before this runs). Defaults cover everything except provider
//! credentials and the database URL, which are validated lazily so a dry
//! run against a keyless source still works.

use std::env;

use sentivol_common::{Result, SentivolError, Source};

/// Default crude-oil futures ticker.
const DEFAULT_TICKER: &str = "CL=F";

const DEFAULT_SUBREDDITS: &[&str] = &["energy", "oil", "investing", "stocks", "commodities"];

const DEFAULT_SOCIAL_KEYWORDS: &[&str] = &[
    "crude", "oil", "wti", "brent", "opec", "petroleum", "barrel",
];

const DEFAULT_VIDEO_KEYWORDS: &[&str] = &[
    "crude oil price",
    "oil market analysis",
    "opec meeting",
    "wti forecast",
];

const DEFAULT_FRED_SERIES: &[&str] =
    &["CPIAUCSL", "FEDFUNDS", "PAYEMS", "UNRATE", "DCOILWTICO"];

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub newsapi_key: Option<String>,
    pub finnhub_key: Option<String>,
    pub youtube_key: Option<String>,
    pub fred_key: Option<String>,
    pub database_url: Option<String>,

    pub asset_ticker: String,
    pub subreddits: Vec<String>,
    pub social_keywords: Vec<String>,
    pub video_keywords: Vec<String>,
    pub fred_series: Vec<String>,

    /// Fetch window for news runs, in days.
    pub news_days_back: i64,
    /// Fetch window for social runs, in days.
    pub social_days_back: i64,
    /// Fetch window for market bars, in days.
    pub market_days_back: i64,

    pub page_size: usize,
    pub max_pages_per_query: usize,
    pub max_videos_per_keyword: usize,
    pub max_comments_per_video: usize,

    /// Attempts per page fetch, including the first.
    pub max_fetch_attempts: u32,
    pub timeout_secs: u64,
    /// Hard ceiling on pages per run.
    pub page_cap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            newsapi_key: None,
            finnhub_key: None,
            youtube_key: None,
            fred_key: None,
            database_url: None,
            asset_ticker: DEFAULT_TICKER.to_string(),
            subreddits: to_owned(DEFAULT_SUBREDDITS),
            social_keywords: to_owned(DEFAULT_SOCIAL_KEYWORDS),
            video_keywords: to_owned(DEFAULT_VIDEO_KEYWORDS),
            fred_series: to_owned(DEFAULT_FRED_SERIES),
            news_days_back: 7,
            social_days_back: 3,
            market_days_back: 60,
            page_size: 10,
            max_pages_per_query: 10,
            max_videos_per_keyword: 10,
            max_comments_per_video: 500,
            max_fetch_attempts: 3,
            timeout_secs: 45,
            page_cap: 500,
        }
    }
}

impl IngestConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            newsapi_key: read_opt("NEWSAPI_KEY"),
            finnhub_key: read_opt("FINNHUB_API_KEY"),
            youtube_key: read_opt("YOUTUBE_API_KEY"),
            fred_key: read_opt("FRED_API_KEY"),
            database_url: read_opt("DATABASE_URL"),
            asset_ticker: read_opt("ASSET_TICKER").unwrap_or(defaults.asset_ticker),
            subreddits: read_list("SUBREDDITS").unwrap_or(defaults.subreddits),
            social_keywords: read_list("SOCIAL_KEYWORDS").unwrap_or(defaults.social_keywords),
            video_keywords: read_list("VIDEO_KEYWORDS").unwrap_or(defaults.video_keywords),
            fred_series: read_list("FRED_SERIES").unwrap_or(defaults.fred_series),
            news_days_back: read_parsed("NEWS_DAYS_BACK")?.unwrap_or(defaults.news_days_back),
            social_days_back: read_parsed("SOCIAL_DAYS_BACK")?
                .unwrap_or(defaults.social_days_back),
            market_days_back: read_parsed("MARKET_DAYS_BACK")?
                .unwrap_or(defaults.market_days_back),
            page_size: read_parsed("PAGE_SIZE")?.unwrap_or(defaults.page_size),
            max_pages_per_query: read_parsed("MAX_PAGES")?.unwrap_or(defaults.max_pages_per_query),
            max_videos_per_keyword: read_parsed("MAX_VIDEOS_PER_KEYWORD")?
                .unwrap_or(defaults.max_videos_per_keyword),
            max_comments_per_video: read_parsed("MAX_COMMENTS_PER_VIDEO")?
                .unwrap_or(defaults.max_comments_per_video),
            max_fetch_attempts: read_parsed("MAX_FETCH_ATTEMPTS")?
                .unwrap_or(defaults.max_fetch_attempts),
            timeout_secs: read_parsed("HTTP_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_secs),
            page_cap: read_parsed("PAGE_CAP")?.unwrap_or(defaults.page_cap),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SentivolError::Config("PAGE_SIZE must be positive".into()));
        }
        if self.max_fetch_attempts == 0 {
            return Err(SentivolError::Config(
                "MAX_FETCH_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.page_cap == 0 {
            return Err(SentivolError::Config("PAGE_CAP must be positive".into()));
        }
        if self.subreddits.is_empty() {
            return Err(SentivolError::Config(
                "SUBREDDITS must name at least one subreddit".into(),
            ));
        }
        if self.fred_series.is_empty() {
            return Err(SentivolError::Config(
                "FRED_SERIES must name at least one series".into(),
            ));
        }
        Ok(())
    }

    /// API key for a keyed source, or a configuration error naming the
    /// variable to set.
    pub fn require_key(&self, source: Source) -> Result<&str> {
        let (key, var) = match source {
            Source::NewsApi => (&self.newsapi_key, "NEWSAPI_KEY"),
            Source::Finnhub => (&self.finnhub_key, "FINNHUB_API_KEY"),
            Source::YouTube => (&self.youtube_key, "YOUTUBE_API_KEY"),
            Source::Fred => (&self.fred_key, "FRED_API_KEY"),
            Source::YahooRss | Source::Reddit | Source::YahooFinance => {
                return Err(SentivolError::Config(format!(
                    "{} does not use an API key",
                    source
                )))
            },
        };
        key.as_deref()
            .ok_or_else(|| SentivolError::Config(format!("{} is not set", var)))
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SentivolError::Config("DATABASE_URL is not set".into()))
    }
}

fn read_opt(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn read_list(var: &str) -> Option<Vec<String>> {
    read_opt(var).map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn read_parsed<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match read_opt(var) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| SentivolError::Config(format!("{} has invalid value '{}'", var, raw))),
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
