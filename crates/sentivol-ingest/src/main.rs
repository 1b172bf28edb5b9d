//! SentiVol Ingest - multi-source signal ingestion tool

use anyhow::Result;
use chrono::TimeZone;
use clap::Parser;
use sentivol_common::logging::{init_logging, LogConfig, LogLevel};
use sentivol_common::{Category, Source};
use sentivol_ingest::adapter::{
    FetchWindow, FinnhubAdapter, FredAdapter, MarketAdapter, NewsApiAdapter, RedditAdapter,
    SourceAdapter, YahooRssAdapter, YouTubeAdapter,
};
use sentivol_ingest::config::IngestConfig;
use sentivol_ingest::normalize::Normalizer;
use sentivol_ingest::runner::{RetryPolicy, RunCoordinator};
use sentivol_ingest::warehouse::{MemWarehouse, PgWarehouse, Warehouse};
use tracing::info;

/// Observations are pulled from a fixed epoch so revisions to older
/// periods keep getting picked up.
const MACRO_EPOCH: (i32, u32, u32) = (2020, 1, 1);

#[derive(Parser, Debug)]
#[command(name = "sentivol-ingest")]
#[command(author, version, about = "SentiVol signal ingestion tool")]
struct Cli {
    /// Data source to ingest
    #[command(subcommand)]
    source: SourceCmd,

    /// Override the fetch window, in hours back from now
    #[arg(long, global = true)]
    window_hours: Option<i64>,

    /// Fetch and normalize but skip the merge
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum SourceCmd {
    /// Ingest NewsAPI crude-oil articles
    News,
    /// Ingest Finnhub general market news
    Finnhub,
    /// Ingest Yahoo Finance RSS headlines
    Rss,
    /// Ingest Reddit posts from configured subreddits
    Social,
    /// Ingest YouTube comments on oil-market videos
    Video,
    /// Ingest FRED macroeconomic series
    Macro,
    /// Ingest daily OHLCV bars
    Market,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("sentivol-ingest".to_string())
        .build();

    // Environment overrides take precedence
    let log_config = log_config.apply_env()?;

    init_logging(&log_config)?;

    let config = IngestConfig::from_env()?;

    let (adapter, category, window): (Box<dyn SourceAdapter>, Category, FetchWindow) =
        match cli.source {
            SourceCmd::News => (
                Box::new(NewsApiAdapter::new(
                    config.require_key(Source::NewsApi)?,
                    config.page_size,
                    config.max_pages_per_query,
                    config.timeout_secs,
                )?),
                Category::News,
                FetchWindow::last_days(config.news_days_back),
            ),
            SourceCmd::Finnhub => (
                Box::new(FinnhubAdapter::new(
                    config.require_key(Source::Finnhub)?,
                    config.timeout_secs,
                )?),
                Category::News,
                FetchWindow::last_days(config.news_days_back),
            ),
            SourceCmd::Rss => (
                Box::new(YahooRssAdapter::new(
                    &config.asset_ticker,
                    config.timeout_secs,
                )?),
                Category::News,
                FetchWindow::last_days(config.news_days_back),
            ),
            SourceCmd::Social => (
                Box::new(RedditAdapter::new(
                    config.subreddits.clone(),
                    config.timeout_secs,
                )?),
                Category::SocialPost,
                FetchWindow::last_days(config.social_days_back),
            ),
            SourceCmd::Video => (
                Box::new(YouTubeAdapter::new(
                    config.require_key(Source::YouTube)?,
                    config.video_keywords.clone(),
                    config.max_videos_per_keyword,
                    config.max_comments_per_video,
                    config.timeout_secs,
                )?),
                Category::VideoComment,
                FetchWindow::last_days(config.news_days_back),
            ),
            SourceCmd::Macro => {
                let (y, m, d) = MACRO_EPOCH;
                let epoch = chrono::Utc
                    .with_ymd_and_hms(y, m, d, 0, 0, 0)
                    .single()
                    .unwrap_or_else(chrono::Utc::now);
                (
                    Box::new(FredAdapter::new(
                        config.require_key(Source::Fred)?,
                        config.fred_series.clone(),
                        config.timeout_secs,
                    )?),
                    Category::MacroSeries,
                    FetchWindow::since(epoch),
                )
            },
            SourceCmd::Market => (
                Box::new(MarketAdapter::new(
                    &config.asset_ticker,
                    config.timeout_secs,
                )?),
                Category::MarketBar,
                FetchWindow::last_days(config.market_days_back),
            ),
        };

    let window = match cli.window_hours {
        Some(hours) => FetchWindow::last_hours(hours),
        None => window,
    };

    let warehouse: Box<dyn Warehouse> = if cli.dry_run {
        Box::new(MemWarehouse::new())
    } else {
        let pg = PgWarehouse::connect(config.require_database_url()?).await?;
        pg.migrate().await?;
        Box::new(pg)
    };

    let normalizer = Normalizer::new(config.social_keywords.clone())?;
    let retry = RetryPolicy {
        max_attempts: config.max_fetch_attempts,
        ..RetryPolicy::default()
    };
    let coordinator = RunCoordinator::new(retry, config.page_cap, cli.dry_run);

    let summary = coordinator
        .run(
            adapter.as_ref(),
            category,
            &window,
            &normalizer,
            warehouse.as_ref(),
        )
        .await?;

    info!(%summary, "ingestion complete");
    println!("{}", summary);
    Ok(())
}
