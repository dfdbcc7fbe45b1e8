//! Unified error types for csvtable.
//!
//! Only I/O-level failures and pre-flight configuration problems surface as
//! errors. Malformed cell content is always recovered while parsing.
use thiserror::Error;

/// Main error type for csvtable operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be read through either the in-memory or the stream path
    #[error("Source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Format definition rejected before reading or writing
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Parse error in a literal or configuration value
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Result type for csvtable operations.
pub type Result<T> = std::result::Result<T, Error>;
