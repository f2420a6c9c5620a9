//! Error types for gift_tracker

use thiserror::Error;

/// Unified error type for gift_tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Feed responded with a non-success status
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Feed body is not readable as CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Snapshot database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Bootstrap document could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for gift_tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
