//! Error types for pdf-dl
//!
//! Two families of errors live here:
//! - [`Error`] is returned from run-level operations and aborts them
//!   (configuration problems, mismatched input columns, table storage failures).
//! - [`FetchError`], [`ValidationError`] and [`CheckError`] describe the failure
//!   of a single item. They never abort a batch; their `Display` text ends up in
//!   the item's `error` field and in the final report.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Status;

/// Result type alias for pdf-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pdf-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_fetches")
        key: Option<String>,
    },

    /// The name, primary source and fallback source columns differ in length
    #[error(
        "input columns do not have matching lengths: {names} names, {primary} primary sources, {fallback} fallback sources"
    )]
    InputMismatch {
        /// Number of values in the name column
        names: usize,
        /// Number of values in the primary source column
        primary: usize,
        /// Number of values in the fallback source column
        fallback: usize,
    },

    /// An item was asked to take a status edge the state machine does not allow
    #[error("item {name}: illegal status transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Item name
        name: String,
        /// Status before the attempted transition
        from: Status,
        /// Requested status
        to: Status,
    },

    /// Table read/write error
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors raised by a [`Table`](crate::table::Table) implementation
#[derive(Debug, Error)]
pub enum TableError {
    /// The table was opened read-only and cannot be saved
    #[error("table is read-only")]
    ReadOnly,

    /// The stored table has the same header twice
    #[error("table has duplicate header entry {0:?}")]
    DuplicateHeader(String),

    /// The backing store failed
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for TableError {
    fn from(e: sqlx::Error) -> Self {
        TableError::Storage(e.to_string())
    }
}

/// Failure to retrieve a document from its source
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The source is not a usable URL
    #[error("download error: invalid source {source_url:?}: {reason}")]
    InvalidSource {
        /// The offending source text
        source_url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connection or protocol level failure
    #[error("download error: {0}")]
    Transport(String),

    /// The configured request timeout elapsed
    #[error("download error: timed out fetching {0}")]
    Timeout(String),

    /// The server answered with a non-success status code
    #[error("download error: HTTP {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The response body could not be read
    #[error("download error: failed to read body from {url}: {reason}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying failure
        reason: String,
    },
}

/// Structural validation failure of a downloaded payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The first four bytes are not `%PDF`
    #[error("document invalid: no PDF header")]
    MissingHeader,

    /// The document could not be parsed
    #[error("document failed to open: {0}")]
    Unparseable(String),

    /// The document parsed but has no pages
    #[error("document invalid: contains zero pages")]
    NoPages,
}

/// Failure anywhere in the validate-and-persist stage
#[derive(Debug, Error)]
pub enum CheckError {
    /// Validation rejected the payload
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Writing the validated document failed
    #[error("document failed to save to {path}: {source}")]
    Persist {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The item name cannot be used as a file name
    #[error("document failed to save: unusable name {name:?}: {reason}")]
    InvalidName {
        /// Item name
        name: String,
        /// Why the name was rejected
        reason: &'static str,
    },

    /// The checker panicked or was aborted
    #[error("check failed unexpectedly: {0}")]
    Panicked(String),
}
