//! Job submission and status operations.
//!
//! Submission is the producer side of the engine: create the job record,
//! then push its id onto the dispatch queue. The record is created first so
//! a dispatch signal never refers to a job that does not exist; the reverse
//! failure (record created, enqueue failed) leaves a record that can be
//! dispatched later via [`LinkDownloader::requeue`].

use crate::db::{Job, NewJob};
use crate::error::{DatabaseError, Error, Result};
use crate::types::{Event, JobId};

use sha2::{Digest, Sha256};
use std::sync::atomic::Ordering;
use url::Url;

use super::LinkDownloader;

impl LinkDownloader {
    /// Submit a link for background download.
    ///
    /// Validates the link, derives the job's stable local file path, inserts
    /// the record, and enqueues the job id for the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] for unparseable or non-http(s) links,
    /// [`Error::Duplicate`] when this owner already submitted this link
    /// (carrying the existing job's id), and [`Error::ShuttingDown`] once
    /// shutdown has begun.
    pub async fn submit(&self, owner_id: i64, uri: &str) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let parsed = Url::parse(uri).map_err(|e| Error::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUri {
                uri: uri.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let local_path = self
            .config
            .download
            .download_dir
            .join(derive_file_name(owner_id, uri, &parsed));

        let new_job = NewJob {
            owner_id,
            source_uri: uri.to_string(),
            local_path: local_path.to_string_lossy().into_owned(),
        };

        let id = match self.store.create_job(&new_job).await {
            Ok(id) => id,
            Err(Error::Database(DatabaseError::ConstraintViolation(msg))) => {
                // Same owner, same link: point the caller at the job that
                // already tracks it
                if let Some(existing) = self.store.find_job(owner_id, uri).await? {
                    return Err(Error::Duplicate {
                        existing: existing.id,
                    });
                }
                return Err(Error::Database(DatabaseError::ConstraintViolation(msg)));
            }
            Err(e) => return Err(e),
        };

        self.queue.enqueue(id).await?;
        self.event_tx.send(Event::JobQueued { id }).ok();
        tracing::info!(job_id = id.0, owner_id, uri, "download job submitted");

        Ok(id)
    }

    /// Fetch a job's current record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no job with this id exists.
    pub async fn job(&self, id: JobId) -> Result<Job> {
        self.store.get_job(id).await?.ok_or(Error::NotFound(id))
    }

    /// Page through one owner's jobs, oldest first.
    pub async fn jobs_for_owner(&self, owner_id: i64, page: i64, limit: i64) -> Result<Vec<Job>> {
        self.store.jobs_for_owner(owner_id, page, limit).await
    }

    /// Push an existing incomplete job's id back onto the dispatch queue.
    ///
    /// A failed attempt is never retried automatically; this is the manual
    /// path by which a producer asks for another attempt. The transfer
    /// resumes from whatever the previous attempts already flushed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown jobs,
    /// [`Error::AlreadyCompleted`] for jobs with nothing left to do, and
    /// [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn requeue(&self, id: JobId) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let job = self.job(id).await?;
        if job.completed {
            return Err(Error::AlreadyCompleted(id));
        }

        self.queue.enqueue(id).await?;
        self.event_tx.send(Event::JobQueued { id }).ok();
        tracing::info!(job_id = id.0, "job re-enqueued");

        Ok(())
    }
}

/// Derive the job's file name from `(owner_id, source_uri)`.
///
/// The sha256 prefix makes the name unique per (owner, link) pair and stable
/// across retries, so a later attempt resumes into the same file; the link's
/// final path segment is kept as a human-readable suffix where one exists.
fn derive_file_name(owner_id: i64, source_uri: &str, parsed: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.to_le_bytes());
    hasher.update(source_uri.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let stem = &digest[..16];

    match parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    {
        Some(name) => format!("{}_{}", stem, sanitize_file_name(name)),
        None => stem.to_string(),
    }
}

/// Replace path-hostile characters so the segment is safe as a file name.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_file_name_is_deterministic() {
        let uri = "http://example.com/files/data.tar.gz";
        let parsed = Url::parse(uri).unwrap();
        assert_eq!(
            derive_file_name(1, uri, &parsed),
            derive_file_name(1, uri, &parsed),
            "same (owner, link) must map to the same file across retries"
        );
    }

    #[test]
    fn test_derive_file_name_differs_per_owner_and_link() {
        let uri = "http://example.com/files/data.tar.gz";
        let parsed = Url::parse(uri).unwrap();
        let other_uri = "http://example.com/files/other.tar.gz";
        let other_parsed = Url::parse(other_uri).unwrap();

        assert_ne!(derive_file_name(1, uri, &parsed), derive_file_name(2, uri, &parsed));
        assert_ne!(
            derive_file_name(1, uri, &parsed),
            derive_file_name(1, other_uri, &other_parsed)
        );
    }

    #[test]
    fn test_derive_file_name_keeps_readable_suffix() {
        let uri = "http://example.com/files/data.tar.gz";
        let parsed = Url::parse(uri).unwrap();
        let name = derive_file_name(1, uri, &parsed);
        assert!(
            name.ends_with("_data.tar.gz"),
            "file name should keep the link's base name: {}",
            name
        );
    }

    #[test]
    fn test_derive_file_name_without_path_segment() {
        let uri = "http://example.com/";
        let parsed = Url::parse(uri).unwrap();
        let name = derive_file_name(1, uri, &parsed);
        assert_eq!(name.len(), 16, "bare hosts get just the hash stem: {}", name);
    }

    #[test]
    fn test_sanitize_file_name_replaces_hostile_chars() {
        assert_eq!(sanitize_file_name("a/b\\c d?.bin"), "a_b_c_d_.bin");
        assert_eq!(sanitize_file_name("plain-name_1.iso"), "plain-name_1.iso");
    }
}
