//! Shared test helpers for creating LinkDownloader instances in tests.

use crate::config::Config;
use crate::downloader::LinkDownloader;
use crate::downloader::worker::WorkerContext;
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Helper to create a test LinkDownloader with fast polling and a database
/// inside a tempdir. Returns the downloader and the tempdir (which must be
/// kept alive). Workers are not started.
pub(crate) async fn create_test_downloader() -> (LinkDownloader, TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config.worker.workers = 2;
    config.worker.poll_interval = Duration::from_millis(20);
    config.worker.lease_ttl = Duration::from_secs(5);

    let downloader = LinkDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Build a WorkerContext wired to the downloader's collaborators, for
/// driving single attempts directly without starting the pool.
pub(crate) fn worker_context(downloader: &LinkDownloader, worker_id: usize) -> WorkerContext {
    WorkerContext {
        worker_id,
        store: Arc::clone(&downloader.store),
        queue: Arc::clone(&downloader.queue),
        lease: Arc::clone(&downloader.lease),
        fetcher: Arc::clone(&downloader.fetcher),
        config: Arc::clone(&downloader.config),
        event_tx: downloader.event_tx.clone(),
        cancel: downloader.cancel.clone(),
    }
}

/// Receive events until one matches the predicate, with a test-global
/// timeout so a hung worker fails the test instead of wedging it.
pub(crate) async fn wait_for_event<F>(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    mut pred: F,
) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
