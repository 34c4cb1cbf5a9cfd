//! Per-job lease lock — time-bounded mutual exclusion for download attempts.
//!
//! A lease guarantees at most one worker processes a given job at a time.
//! Expiry is passive: a lease whose TTL has elapsed is simply treated as
//! absent, so a crashed worker blocks its job for at most one TTL. Holders
//! renew at half the TTL while a transfer streams.
//!
//! Every acquisition is fenced by a [`LeaseToken`]: `extend` and `release`
//! are conditional on the presented token matching the stored one, so a
//! worker whose lease expired and was re-granted elsewhere cannot disturb
//! the new holder.

use crate::error::Result;
use crate::types::{JobId, LeaseToken};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Abstraction over the lease lock backend.
///
/// The in-process [`MemoryLeaseLock`] is the shipped implementation; the
/// trait is the seam for a shared backend (e.g. Redis `SET NX PX` with
/// compare-and-delete scripts) when workers span processes.
#[async_trait::async_trait]
pub trait LeaseLock: Send + Sync {
    /// Atomically create a lease for `id` with the given TTL, but only if no
    /// live lease exists.
    ///
    /// Returns the fencing token on success, `None` when the job is already
    /// leased (the normal "being processed elsewhere" outcome, not an error).
    async fn acquire(&self, id: JobId, ttl: Duration) -> Result<Option<LeaseToken>>;

    /// Reset the expiry of the lease for `id` iff `token` still matches.
    ///
    /// Returns whether the renewal took effect. `false` means the lease
    /// expired (and was possibly re-acquired by someone else); the caller
    /// has lost exclusivity.
    async fn extend(&self, id: JobId, token: &LeaseToken, ttl: Duration) -> Result<bool>;

    /// Remove the lease for `id` iff `token` still matches.
    ///
    /// Returns whether a lease was actually removed.
    async fn release(&self, id: JobId, token: &LeaseToken) -> Result<bool>;
}

struct LeaseEntry {
    token: LeaseToken,
    expires_at: Instant,
}

/// In-memory lease lock with passive TTL expiry.
///
/// Expired entries are dropped lazily when touched; no background sweeper
/// runs.
#[derive(Default)]
pub struct MemoryLeaseLock {
    leases: Mutex<HashMap<JobId, LeaseEntry>>,
}

impl MemoryLeaseLock {
    /// Create an empty lease lock.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LeaseLock for MemoryLeaseLock {
    async fn acquire(&self, id: JobId, ttl: Duration) -> Result<Option<LeaseToken>> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(entry) = leases.get(&id) {
            if entry.expires_at > now {
                return Ok(None);
            }
            // Expired lease: the previous holder crashed or stalled past its
            // TTL. Take over.
            tracing::debug!(job_id = id.0, "taking over expired lease");
        }

        let token = LeaseToken::generate();
        leases.insert(
            id,
            LeaseEntry {
                token,
                expires_at: now + ttl,
            },
        );
        Ok(Some(token))
    }

    async fn extend(&self, id: JobId, token: &LeaseToken, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        match leases.get_mut(&id) {
            Some(entry) if entry.token == *token && entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: JobId, token: &LeaseToken) -> Result<bool> {
        let mut leases = self.leases.lock().await;

        match leases.get(&id) {
            Some(entry) if entry.token == *token => {
                leases.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
