//! Configuration types for link-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Top-level configuration
///
/// All fields have sensible defaults; `Config::default()` yields a working
/// single-process setup with four workers and a SQLite database in the
/// current directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download storage settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Worker pool settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// HTTP client settings for the fetcher
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Validate settings that have no sensible zero value.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.worker.workers == 0 {
            return Err(Error::Config {
                message: "worker pool size must be at least 1".to_string(),
                key: Some("worker.workers".to_string()),
            });
        }
        if self.worker.lease_ttl.is_zero() {
            return Err(Error::Config {
                message: "lease TTL must be non-zero".to_string(),
                key: Some("worker.lease_ttl".to_string()),
            });
        }
        Ok(())
    }
}

/// Download storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory where fetched files are written (default: "./downloads")
    ///
    /// Each job's file path inside this directory is a deterministic function
    /// of `(owner_id, source_uri)`, so a re-submitted link resumes into the
    /// same file.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// Worker pool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of polling worker loops (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Sleep between polls when the dispatch queue is empty (default: 1s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Time-to-live for a job's processing lease (default: 60s)
    ///
    /// The lease is renewed at half this interval while a transfer is
    /// streaming, so one missed heartbeat does not cause premature expiry.
    /// A crashed worker blocks reprocessing of its job for at most this long.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval: default_poll_interval(),
            lease_ttl: default_lease_ttl(),
        }
    }
}

/// HTTP client configuration for the resumable fetcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// TCP connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Per-read socket timeout (default: 60s)
    ///
    /// Also bounds worst-case shutdown latency: cancellation is only observed
    /// between reads, so a stalled read ends after at most this long.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// User-Agent header sent with range requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./link-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_workers() -> usize {
    4
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_lease_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("link-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./link-dl.db")
}
