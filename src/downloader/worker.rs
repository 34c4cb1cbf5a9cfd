//! Worker pool — long-lived polling loops that process dispatched jobs.
//!
//! Each worker repeats the same attempt shape: pop a job id, load the
//! record, take the job's lease, run the resumable fetcher while renewing
//! the lease, write the outcome back to the record, release the lease.
//! Workers share nothing mutable with each other; all coordination goes
//! through the injected queue, lease, and store collaborators.
//!
//! An attempt that fails at any step never kills its worker: the outcome is
//! recorded (or at worst logged) and the loop moves on to the next poll.

use crate::config::Config;
use crate::db::JobStore;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::lease::LeaseLock;
use crate::queue::DispatchQueue;
use crate::types::{Event, JobId};

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::LinkDownloader;

/// Everything one worker loop needs, cloned from the downloader at start.
pub(crate) struct WorkerContext {
    pub(crate) worker_id: usize,
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) queue: Arc<dyn DispatchQueue>,
    pub(crate) lease: Arc<dyn LeaseLock>,
    pub(crate) fetcher: Arc<Fetcher>,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl LinkDownloader {
    /// Start the worker pool.
    ///
    /// Spawns the configured number of polling loops. All loops observe the
    /// downloader's cancellation token and exit together on
    /// [`shutdown`](Self::shutdown). Calling `start` twice spawns a second
    /// set of loops; don't.
    pub async fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;

        for worker_id in 0..self.config.worker.workers {
            let ctx = WorkerContext {
                worker_id,
                store: Arc::clone(&self.store),
                queue: Arc::clone(&self.queue),
                lease: Arc::clone(&self.lease),
                fetcher: Arc::clone(&self.fetcher),
                config: Arc::clone(&self.config),
                event_tx: self.event_tx.clone(),
                cancel: self.cancel.clone(),
            };
            workers.push(tokio::spawn(run_worker(ctx)));
        }

        tracing::info!(workers = self.config.worker.workers, "Worker pool started");
        Ok(())
    }
}

/// One worker's poll loop: dequeue, process, repeat until cancelled.
pub(crate) async fn run_worker(ctx: WorkerContext) {
    tracing::info!(worker = ctx.worker_id, "Worker started");

    loop {
        if ctx.cancel.is_cancelled() {
            tracing::info!(worker = ctx.worker_id, "Worker stopping");
            return;
        }

        let id = match ctx.queue.dequeue().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                // Queue empty: the only busy-wait in the system
                idle_backoff(&ctx).await;
                continue;
            }
            Err(e) => {
                tracing::error!(
                    worker = ctx.worker_id,
                    error = %e,
                    "Failed to poll dispatch queue"
                );
                idle_backoff(&ctx).await;
                continue;
            }
        };

        process_job(&ctx, id).await;
    }
}

/// Cancellation-aware sleep between polls of an empty queue.
async fn idle_backoff(ctx: &WorkerContext) {
    tokio::select! {
        _ = ctx.cancel.cancelled() => {}
        _ = tokio::time::sleep(ctx.config.worker.poll_interval) => {}
    }
}

/// Run one end-to-end attempt for a dequeued job id.
///
/// The dispatch signal is consumed either way: an attempt that aborts before
/// acquiring the lease (missing record, contended lease, backend failure)
/// leaves the record untouched, and nothing re-enqueues the id.
pub(crate) async fn process_job(ctx: &WorkerContext, id: JobId) {
    tracing::debug!(worker = ctx.worker_id, job_id = id.0, "Processing dispatch");

    let job = match ctx.store.get_job(id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(
                worker = ctx.worker_id,
                job_id = id.0,
                "Job record missing, dropping dispatch"
            );
            return;
        }
        Err(e) => {
            tracing::error!(
                worker = ctx.worker_id,
                job_id = id.0,
                error = %e,
                "Failed to load job record, dropping dispatch"
            );
            return;
        }
    };

    if job.completed {
        // A re-enqueued id can race an attempt that already finished
        tracing::debug!(
            worker = ctx.worker_id,
            job_id = id.0,
            "Job already completed, skipping"
        );
        return;
    }

    let ttl = ctx.config.worker.lease_ttl;
    let token = match ctx.lease.acquire(id, ttl).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            // Another worker holds the lease; this is their attempt, not ours
            tracing::debug!(
                worker = ctx.worker_id,
                job_id = id.0,
                "Lease contended, job already being processed"
            );
            return;
        }
        Err(e) => {
            tracing::error!(
                worker = ctx.worker_id,
                job_id = id.0,
                error = %e,
                "Failed to acquire lease, dropping dispatch"
            );
            return;
        }
    };
    tracing::debug!(
        worker = ctx.worker_id,
        job_id = id.0,
        ttl_secs = ttl.as_secs(),
        "Lease acquired"
    );

    ctx.event_tx
        .send(Event::JobStarted {
            id,
            worker: ctx.worker_id,
        })
        .ok();

    // Heartbeat wired to this acquisition's token; fires at half the TTL
    // from inside the fetch loop and stops with it
    let renew = {
        let lease = Arc::clone(&ctx.lease);
        move || {
            let lease = Arc::clone(&lease);
            async move {
                match lease.extend(id, &token, ttl).await {
                    Ok(true) => tracing::debug!(job_id = id.0, "Lease renewed"),
                    Ok(false) => tracing::warn!(
                        job_id = id.0,
                        "Lease renewal refused, exclusivity may be lost"
                    ),
                    Err(e) => tracing::error!(job_id = id.0, error = %e, "Lease renewal failed"),
                }
            }
        }
    };

    let outcome = ctx
        .fetcher
        .fetch(
            &job.source_uri,
            Path::new(&job.local_path),
            ttl / 2,
            &ctx.cancel,
            renew,
        )
        .await;

    match outcome {
        Ok(bytes) => {
            if let Err(e) = ctx.store.mark_completed(id).await {
                // The transfer finished; losing the record update is logged,
                // never escalated
                tracing::error!(
                    worker = ctx.worker_id,
                    job_id = id.0,
                    error = %e,
                    "Fetch succeeded but completion could not be recorded"
                );
            }
            tracing::info!(worker = ctx.worker_id, job_id = id.0, bytes, "Download complete");
            ctx.event_tx.send(Event::JobCompleted { id, bytes }).ok();
        }
        Err(fetch_err) => {
            let message = fetch_err.to_string();
            if let Err(e) = ctx.store.mark_error(id, &message).await {
                tracing::error!(
                    worker = ctx.worker_id,
                    job_id = id.0,
                    error = %e,
                    "Failed to record attempt error"
                );
            }
            tracing::warn!(
                worker = ctx.worker_id,
                job_id = id.0,
                error = %message,
                "Download attempt failed"
            );
            ctx.event_tx.send(Event::JobFailed { id, error: message }).ok();
        }
    }

    // Release is the unconditional last step of every attempt
    match ctx.lease.release(id, &token).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            job_id = id.0,
            "Lease no longer held at release, it expired mid-attempt"
        ),
        Err(e) => tracing::error!(job_id = id.0, error = %e, "Lease release failed"),
    }
}
