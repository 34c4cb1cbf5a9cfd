//! Database layer for link-dl
//!
//! Handles SQLite persistence for download job records.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`jobs`] — Job record CRUD
//!
//! Workers never touch [`Database`] directly; they consume the [`JobStore`]
//! trait, which keeps the persistence backend swappable and mockable.

use crate::error::Result;
use crate::types::JobId;
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// New job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Id of the submitting user
    pub owner_id: i64,
    /// Remote link to download
    pub source_uri: String,
    /// Local file path, derived once from `(owner_id, source_uri)`
    pub local_path: String,
}

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    /// Unique database id
    pub id: JobId,
    /// Id of the submitting user
    pub owner_id: i64,
    /// Remote link to download
    pub source_uri: String,
    /// Local file path the transfer streams into
    pub local_path: String,
    /// Whether the full transfer has finished
    pub completed: bool,
    /// Description of the most recent failed attempt, empty if none
    pub last_error: String,
    /// Unix timestamp of submission
    pub created_at: i64,
}

/// Contract the worker pool consumes from the job record store.
///
/// [`Database`] is the production implementation; tests substitute their own
/// to exercise worker behavior against store failures.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record, enforcing the `(owner_id, source_uri)`
    /// uniqueness constraint.
    async fn create_job(&self, job: &NewJob) -> Result<JobId>;

    /// Fetch a job by id, `None` if no such record exists.
    async fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Look up a job by its unique `(owner_id, source_uri)` pair.
    async fn find_job(&self, owner_id: i64, source_uri: &str) -> Result<Option<Job>>;

    /// Page through one owner's jobs, oldest first.
    async fn jobs_for_owner(&self, owner_id: i64, page: i64, limit: i64) -> Result<Vec<Job>>;

    /// Set `completed = true` on a job after a full transfer.
    async fn mark_completed(&self, id: JobId) -> Result<()>;

    /// Overwrite the job's `last_error` with the latest attempt's failure.
    async fn mark_error(&self, id: JobId, message: &str) -> Result<()>;
}

/// SQLite-backed job record store
#[derive(Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
