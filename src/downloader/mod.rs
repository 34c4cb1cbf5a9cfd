//! Core downloader implementation split into focused submodules.
//!
//! The `LinkDownloader` struct and its methods are organized by domain:
//! - [`submit`] - Job submission, status reads, manual re-enqueueing
//! - [`worker`] - The polling worker pool that processes dispatched jobs

mod submit;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::db::{Database, JobStore};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::lease::{LeaseLock, MemoryLeaseLock};
use crate::queue::{DispatchQueue, MemoryQueue};
use crate::types::Event;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Composes the collaborators of the processing engine (job store, dispatch
/// queue, lease lock, fetcher) behind trait objects, so every backend is an
/// injected dependency rather than ambient global state.
#[derive(Clone)]
pub struct LinkDownloader {
    /// Job record store (source of truth for job state)
    pub(crate) store: Arc<dyn JobStore>,
    /// Dispatch queue carrying job ids from producers to workers
    pub(crate) queue: Arc<dyn DispatchQueue>,
    /// Per-job lease lock serializing download attempts
    pub(crate) lease: Arc<dyn LeaseLock>,
    /// Shared resumable fetcher
    pub(crate) fetcher: Arc<Fetcher>,
    /// Configuration (read once at startup, immutable afterwards)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Shared cancellation signal observed by every worker loop
    pub(crate) cancel: CancellationToken,
    /// Join handles of the running worker loops
    pub(crate) workers: Arc<tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    /// Flag cleared during shutdown so no new submissions are accepted
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl LinkDownloader {
    /// Create a downloader with the default in-process backends.
    ///
    /// Opens (creating if missing) the SQLite job store, an in-memory
    /// dispatch queue, and an in-memory lease lock. Workers are not running
    /// yet; call [`start`](Self::start) to spawn the pool.
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_backends(
            config,
            Arc::new(db),
            Arc::new(MemoryQueue::new()),
            Arc::new(MemoryLeaseLock::new()),
        )
        .await
    }

    /// Create a downloader with explicitly injected backends.
    ///
    /// This is the seam for shared queue/lock services (or a different
    /// record store) when several processes feed one logical pool.
    pub async fn with_backends(
        config: Config,
        store: Arc<dyn JobStore>,
        queue: Arc<dyn DispatchQueue>,
        lease: Arc<dyn LeaseLock>,
    ) -> Result<Self> {
        config.validate()?;

        // Ensure the download directory exists before any worker needs it
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let fetcher = Arc::new(Fetcher::new(&config.fetch)?);

        // Broadcast channel with room for a burst of job events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Ok(Self {
            store,
            queue,
            lease,
            fetcher,
            config: Arc::new(config),
            event_tx,
            cancel: CancellationToken::new(),
            workers: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to job lifecycle events.
    ///
    /// Each receiver gets every event sent after it subscribed. Slow
    /// receivers that fall behind the channel capacity miss events; the job
    /// store remains the source of truth.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Gracefully stop the worker pool.
    ///
    /// Stops accepting submissions, signals cancellation, and waits for each
    /// worker to finish its current attempt's bookkeeping and exit. An
    /// attempt interrupted mid-stream records the cancellation in the job's
    /// `last_error` and releases its lease before the worker exits.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker task panicked during shutdown");
            }
        }

        self.event_tx.send(Event::Shutdown).ok();

        // The store's connections close when the last reference drops
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
