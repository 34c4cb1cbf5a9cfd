//! Resumable streaming fetcher — ranged HTTP-to-disk transfer with periodic
//! durability flushes.
//!
//! A fetch always resumes from the local file's current length via a
//! `Range: bytes=<offset>-` request, so interrupted transfers pick up where
//! the last flushed byte landed. The fetcher performs exactly one attempt:
//! no internal retry, no backoff. Retry policy belongs to whoever re-enqueues
//! the job.

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use futures::StreamExt;
use reqwest::{StatusCode, header};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Read buffer size for streaming response bodies (128 KiB)
const DOWNLOAD_BUF_SIZE: usize = 128 * 1024;

/// Force a durability flush after this many unflushed bytes (1 MiB)
///
/// Bounds data lost to a crash to under this threshold; resumption restarts
/// from the file length, which never exceeds the last flushed byte by more
/// than the OS chose to write back on its own.
const FLUSH_THRESHOLD: u64 = 8 * DOWNLOAD_BUF_SIZE as u64;

/// Streams remote resources into local files with range-request resumption.
///
/// Holds a shared connection-pooling [`reqwest::Client`]; cheap to clone via
/// `Arc` and safe to use from every worker concurrently.
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher from the HTTP client settings.
    ///
    /// The read timeout doubles as the worst-case shutdown latency bound:
    /// cancellation is only observed between reads, so a stalled socket ends
    /// an attempt after at most this long.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self { client })
    }

    /// Run one transfer attempt for `uri` into `path`.
    ///
    /// Opens the file append-create, resumes from its current length, and
    /// streams the body through a fixed-size buffer with a durability flush
    /// every [`FLUSH_THRESHOLD`] bytes and once more at end-of-stream. The
    /// `renew` callback fires every `renew_interval` for as long as the
    /// stream runs (lease heartbeat); it stops with the attempt, success or
    /// not, leaving nothing running in the background.
    ///
    /// Returns the number of bytes transferred by *this* attempt. On any
    /// error the partial file is left as-is so the next attempt can resume
    /// from its length.
    ///
    /// Resumption assumes the remote resource is stable across attempts and
    /// honors byte ranges; a resource that changed between attempts will
    /// silently produce a file that diverges from a fresh download.
    pub async fn fetch<R, Fut>(
        &self,
        uri: &str,
        path: &Path,
        renew_interval: Duration,
        cancel: &CancellationToken,
        renew: R,
    ) -> std::result::Result<u64, FetchError>
    where
        R: Fn() -> Fut,
        Fut: Future<Output = ()>,
    {
        let storage_err =
            |e: std::io::Error| FetchError::Storage { path: path.to_path_buf(), source: e };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await
            .map_err(storage_err)?;
        let offset = file.metadata().await.map_err(storage_err)?.len();

        let response = self
            .client
            .get(uri)
            .header(header::RANGE, format!("bytes={}-", offset))
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::RemoteStatus {
                uri: uri.to_string(),
                status,
            });
        }
        tracing::debug!(uri, offset, status = status.as_u16(), "range request accepted");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let mut reader = StreamReader::new(stream);

        let mut buf = vec![0u8; DOWNLOAD_BUF_SIZE];
        let mut total: u64 = 0;
        let mut unflushed: u64 = 0;

        // First renewal is due a full interval after the lease was granted
        let mut renew_ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + renew_interval,
            renew_interval,
        );

        loop {
            // Cooperative cancellation, observed between buffer reads
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            tokio::select! {
                _ = renew_ticker.tick() => {
                    renew().await;
                }
                read = reader.read(&mut buf) => {
                    let n = read.map_err(|e| FetchError::Transport {
                        uri: uri.to_string(),
                        message: e.to_string(),
                    })?;

                    if n == 0 {
                        // End of remote data: flush whatever is still buffered
                        file.sync_data().await.map_err(storage_err)?;
                        tracing::debug!(uri, bytes = total, "transfer complete");
                        return Ok(total);
                    }

                    file.write_all(&buf[..n]).await.map_err(storage_err)?;
                    total += n as u64;
                    unflushed += n as u64;

                    if unflushed >= FLUSH_THRESHOLD {
                        file.sync_data().await.map_err(storage_err)?;
                        tracing::trace!(uri, bytes = total, "flushed to disk");
                        unflushed = 0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        Fetcher::new(&FetchConfig::default()).unwrap()
    }

    async fn noop_renew() {}

    #[tokio::test]
    async fn test_fresh_download_writes_full_body() {
        let server = MockServer::start().await;
        let body = vec![0xabu8; 300 * 1024]; // spans multiple buffer reads
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(header("Range", "bytes=0-"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("file.bin");

        let bytes = test_fetcher()
            .fetch(
                &format!("{}/file.bin", server.uri()),
                &target,
                Duration::from_secs(30),
                &CancellationToken::new(),
                noop_renew,
            )
            .await
            .unwrap();

        assert_eq!(bytes, body.len() as u64);
        assert_eq!(std::fs::read(&target).unwrap(), body);
    }

    #[tokio::test]
    async fn test_resume_requests_range_from_file_length() {
        let full: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let resume_at = 77_000usize;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(header("Range", format!("bytes={}-", resume_at).as_str()))
            .respond_with(
                ResponseTemplate::new(206).set_body_bytes(full[resume_at..].to_vec()),
            )
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("file.bin");
        // Simulate an interrupted earlier attempt that flushed a prefix
        std::fs::write(&target, &full[..resume_at]).unwrap();

        let bytes = test_fetcher()
            .fetch(
                &format!("{}/file.bin", server.uri()),
                &target,
                Duration::from_secs(30),
                &CancellationToken::new(),
                noop_renew,
            )
            .await
            .unwrap();

        assert_eq!(
            bytes,
            (full.len() - resume_at) as u64,
            "attempt reports only the bytes it transferred"
        );
        assert_eq!(
            std::fs::read(&target).unwrap(),
            full,
            "resumed file must be byte-identical to a fresh download"
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_is_terminal_and_leaves_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("gone.bin");
        std::fs::write(&target, b"partial").unwrap();

        let err = test_fetcher()
            .fetch(
                &format!("{}/gone.bin", server.uri()),
                &target,
                Duration::from_secs(30),
                &CancellationToken::new(),
                noop_renew,
            )
            .await
            .unwrap_err();

        match err {
            FetchError::RemoteStatus { status, .. } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
            }
            other => panic!("expected RemoteStatus, got: {:?}", other),
        }
        assert_eq!(
            std::fs::read(&target).unwrap(),
            b"partial",
            "a failed attempt must not disturb the partial file"
        );
    }

    #[tokio::test]
    async fn test_cancellation_surfaces_between_reads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1024]))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("file.bin");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = test_fetcher()
            .fetch(
                &format!("{}/file.bin", server.uri()),
                &target,
                Duration::from_secs(30),
                &cancel,
                noop_renew,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("file.bin");

        // Port 1 is essentially never listening
        let err = test_fetcher()
            .fetch(
                "http://127.0.0.1:1/file.bin",
                &target,
                Duration::from_secs(30),
                &CancellationToken::new(),
                noop_renew,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
