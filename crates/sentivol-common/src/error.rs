//! Error types for SentiVol

use thiserror::Error;

/// Result type alias for SentiVol operations
pub type Result<T> = std::result::Result<T, SentivolError>;

/// Main error type for SentiVol
#[derive(Error, Debug)]
pub enum SentivolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Terminal outcome of a failed ingestion run, surfaced to the scheduler.
///
/// Exactly one reason is attached to a failed run; the mapping from
/// lower-level errors is owned by the run coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Provider stayed unreachable or rate-limited past the retry budget.
    SourceUnavailable,
    /// Credentials rejected or required configuration missing. Never retried.
    ConfigurationError,
    /// The warehouse could not complete the merge. The whole run is safe to
    /// re-invoke because staging is never consumed partially.
    MergeUnavailable,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::SourceUnavailable => write!(f, "source_unavailable"),
            FailureReason::ConfigurationError => write!(f, "configuration_error"),
            FailureReason::MergeUnavailable => write!(f, "merge_unavailable"),
        }
    }
}
