//! Job record CRUD operations.

use crate::error::DatabaseError;
use crate::types::JobId;
use crate::{Error, Result};

use super::{Database, Job, JobStore, NewJob};

#[async_trait::async_trait]
impl JobStore for Database {
    /// Insert a new job record
    ///
    /// A second submission of the same `(owner_id, source_uri)` pair violates
    /// the table's uniqueness constraint and surfaces as
    /// [`DatabaseError::ConstraintViolation`].
    async fn create_job(&self, job: &NewJob) -> Result<JobId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (owner_id, source_uri, local_path, completed, last_error, created_at)
            VALUES (?, ?, ?, 0, '', ?)
            "#,
        )
        .bind(job.owner_id)
        .bind(&job.source_uri)
        .bind(&job.local_path)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "owner {} already submitted '{}'",
                    job.owner_id, job.source_uri
                )))
            }
            _ => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            ))),
        })?;

        Ok(JobId(result.last_insert_rowid()))
    }

    /// Get a job by id
    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, source_uri, local_path, completed, last_error, created_at
            FROM jobs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Find a job by its unique `(owner_id, source_uri)` pair
    async fn find_job(&self, owner_id: i64, source_uri: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, source_uri, local_path, completed, last_error, created_at
            FROM jobs
            WHERE owner_id = ? AND source_uri = ?
            "#,
        )
        .bind(owner_id)
        .bind(source_uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find job: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Page through one owner's jobs, oldest first
    async fn jobs_for_owner(&self, owner_id: i64, page: i64, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, source_uri, local_path, completed, last_error, created_at
            FROM jobs
            WHERE owner_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(page * limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Mark a job as completed
    async fn mark_completed(&self, id: JobId) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET completed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to mark job completed: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Job {} not found",
                id
            ))));
        }

        Ok(())
    }

    /// Overwrite the job's last error
    async fn mark_error(&self, id: JobId, message: &str) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET last_error = ? WHERE id = ?")
            .bind(message)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record job error: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Job {} not found",
                id
            ))));
        }

        Ok(())
    }
}
