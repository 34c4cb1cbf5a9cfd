//! Error types for link-dl
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] — top-level error for facade operations and backends
//! - [`DatabaseError`] — persistence-layer failures
//! - [`FetchError`] — per-attempt transfer failures recorded on the job
//!
//! Two conditions are deliberately *not* errors and never appear here: an
//! empty dispatch queue (normal backoff trigger, surfaced as `Ok(None)`) and
//! a contended lease (normal concurrent-attempt outcome, surfaced as
//! `Ok(None)` from `acquire`).

use crate::types::JobId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for link-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for link-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker.workers")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A download attempt failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Submitted link could not be parsed or uses an unsupported scheme
    #[error("invalid download link '{uri}': {reason}")]
    InvalidUri {
        /// The link as submitted
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// The same owner already submitted this link
    #[error("duplicate submission: job {existing} already tracks this link")]
    Duplicate {
        /// Id of the job created by the earlier submission
        existing: JobId,
    },

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Job is already completed, nothing to do
    #[error("job {0} is already completed")]
    AlreadyCompleted(JobId),

    /// Queue or lease backend failure
    #[error("coordination backend error: {0}")]
    Backend(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new submissions
    #[error("shutdown in progress: not accepting new submissions")]
    ShuttingDown,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate (owner, link) pair)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Errors ending a single download attempt.
///
/// Whatever variant ends an attempt is rendered into the job's `last_error`
/// field; none of these crash a worker or trigger an automatic retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote answered with something other than 200 or 206
    #[error("unexpected HTTP status {status} for {uri}")]
    RemoteStatus {
        /// The link being fetched
        uri: String,
        /// The status the remote returned
        status: reqwest::StatusCode,
    },

    /// Connect failure or network error while streaming the body
    #[error("transport error for {uri}: {message}")]
    Transport {
        /// The link being fetched
        uri: String,
        /// Description of the underlying network failure
        message: String,
    },

    /// Local file open, write, or flush failure
    #[error("storage error for {}: {source}", path.display())]
    Storage {
        /// The local file being written
        path: PathBuf,
        /// The underlying I/O failure
        source: std::io::Error,
    },

    /// The attempt was interrupted by shutdown
    #[error("download cancelled")]
    Cancelled,
}
