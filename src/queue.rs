//! Dispatch queue — FIFO handoff of job ids from producers to workers.
//!
//! The queue carries "work exists" signals only, never payload; the job
//! record in the store stays the source of truth. A popped id is gone for
//! good: there is no visibility timeout and no redelivery, so a worker that
//! dies after `dequeue` loses that dispatch signal until a producer enqueues
//! the id again.

use crate::error::Result;
use crate::types::JobId;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Abstraction over the dispatch queue backend.
///
/// The in-process [`MemoryQueue`] is the shipped implementation; the trait is
/// the seam for an external shared backend (e.g. a Redis list) when several
/// processes feed one pool of workers.
#[async_trait::async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Append a job id at the tail of the queue.
    async fn enqueue(&self, id: JobId) -> Result<()>;

    /// Remove and return the id at the head of the queue.
    ///
    /// `Ok(None)` means the queue is empty, a normal condition that callers
    /// answer with backoff, not an error.
    async fn dequeue(&self) -> Result<Option<JobId>>;
}

/// In-memory FIFO dispatch queue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<JobId>>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DispatchQueue for MemoryQueue {
    async fn enqueue(&self, id: JobId) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push_back(id);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<JobId>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.pop_front())
    }
}
