//! # Error Types
//!
//! Custom error types for the telemetry formatter using `thiserror`.

use thiserror::Error;

/// Main error type for the telemetry formatter
#[derive(Debug, Error)]
pub enum FormatterError {
    /// CSV line with the wrong number of fields
    #[error("Malformed record {from_end} line(s) from the end: expected {expected} fields, found {found}")]
    MalformedRecord {
        from_end: usize,
        expected: usize,
        found: usize,
    },

    /// Device timestamp that does not match the fixed-width layout
    #[error("Malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// Local time offset outside ±23:59
    #[error("Invalid time offset: {0} minutes")]
    InvalidOffset(i32),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure caught at the transmission boundary
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the telemetry formatter
pub type Result<T> = std::result::Result<T, FormatterError>;
