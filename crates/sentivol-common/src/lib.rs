//! SentiVol Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging for the SentiVol workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the run-level failure taxonomy shared by all members
//! - **Logging**: tracing-based logging bootstrap with env overrides
//! - **Types**: canonical record shapes used across ingestion and storage

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{FailureReason, Result, SentivolError};
pub use types::{CanonicalRecord, Category, Payload, RunSummary, Source};
