//! # link-dl
//!
//! Backend library for a resumable link download service: users submit
//! remote file links, a pool of background workers fetches them to local
//! storage, and interrupted transfers resume from the last flushed byte,
//! across attempts and across restarts.
//!
//! ## Design Philosophy
//!
//! link-dl is designed to be:
//! - **Library-first** - No CLI or HTTP layer, purely a Rust crate for embedding
//! - **Crash-tolerant** - Periodic durability flushes plus ranged resumption
//!   bound what an interrupted transfer ever has to redo
//! - **Exactly-one-worker** - A fenced, TTL-bounded lease per job guarantees
//!   at most one worker processes it at a time
//! - **Backend-agnostic** - The store, queue, and lock are injected trait
//!   objects; the shipped in-process backends can be swapped for shared ones
//!
//! ## Quick Start
//!
//! ```no_run
//! use link_dl::{Config, LinkDownloader, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = LinkDownloader::new(Config::default()).await?;
//!     downloader.start().await?;
//!
//!     let job_id = downloader
//!         .submit(1, "https://example.com/large-file.iso")
//!         .await?;
//!     println!("submitted job {job_id}");
//!
//!     // Run until SIGTERM/SIGINT, then drain the workers
//!     run_with_shutdown(downloader).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (facade, submission ops, worker pool)
pub mod downloader;
/// Error types
pub mod error;
/// Resumable streaming fetcher
pub mod fetch;
/// Per-job lease lock
pub mod lease;
/// Dispatch queue
pub mod queue;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, FetchConfig, PersistenceConfig, WorkerConfig};
pub use db::{Database, Job, JobStore, NewJob};
pub use downloader::LinkDownloader;
pub use error::{DatabaseError, Error, FetchError, Result};
pub use fetch::Fetcher;
pub use lease::{LeaseLock, MemoryLeaseLock};
pub use queue::{DispatchQueue, MemoryQueue};
pub use types::{Event, JobId, LeaseToken};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(downloader: LinkDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers,
    // tests); fall back to ctrl_c rather than refusing to run
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
