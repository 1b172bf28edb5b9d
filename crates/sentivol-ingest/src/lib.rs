//! SentiVol Ingest Library
//!
//! Multi-source ingestion of public market signals into a deduplicated
//! warehouse.
//!
//! # Supported Data Sources
//!
//! - **NewsAPI / Finnhub / Yahoo RSS**: crude-oil news articles
//! - **Reddit**: social posts from energy and markets subreddits
//! - **YouTube**: comments on oil-market videos
//! - **FRED**: macroeconomic series observations
//! - **Yahoo Finance**: daily OHLCV futures bars
//!
//! # Pipeline
//!
//! One run per category: fetch pages from a [`adapter::SourceAdapter`],
//! normalize each item into a `CanonicalRecord`, stage the batch, then
//! reconcile it against the durable table with the idempotent
//! [`merge::MergeEngine`]. Re-running a window never duplicates rows.

pub mod adapter;
pub mod config;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod runner;
pub mod staging;
pub mod warehouse;
