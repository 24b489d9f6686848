//! Error types for tailgate

use thiserror::Error;

/// Result type alias for tailgate operations
pub type Result<T> = std::result::Result<T, TailgateError>;

/// Main error type for tailgate
///
/// These are startup-time failures. Per-line parse failures are
/// [`crate::parser::ParseError`] and never escalate to this type.
#[derive(Error, Debug)]
pub enum TailgateError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid URL rename pattern
    #[error("invalid url rename pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),
}
