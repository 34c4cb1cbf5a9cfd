//! Core types for link-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for JobId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<JobId> for i64 {
    fn eq(&self, other: &JobId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Opaque fencing token identifying one lease acquisition.
///
/// `extend` and `release` only act when the presented token matches the one
/// stored with the lease, so a worker whose lease expired mid-attempt cannot
/// evict a lease that has since been granted to another worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LeaseToken(u64);

impl LeaseToken {
    /// Generate a fresh random token for a new lease acquisition.
    pub(crate) fn generate() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Events emitted on the broadcast channel as jobs move through the system.
///
/// Subscribe via [`crate::LinkDownloader::subscribe`]. Events are advisory;
/// the job record in the store is the source of truth for job state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was created and its id pushed onto the dispatch queue
    JobQueued {
        /// Id of the queued job
        id: JobId,
    },
    /// A worker acquired the job's lease and began a download attempt
    JobStarted {
        /// Id of the job being processed
        id: JobId,
        /// Index of the worker running the attempt
        worker: usize,
    },
    /// A download attempt finished the transfer and the record was marked completed
    JobCompleted {
        /// Id of the completed job
        id: JobId,
        /// Bytes transferred during this attempt (excludes previously resumed bytes)
        bytes: u64,
    },
    /// A download attempt ended in an error, recorded on the job
    JobFailed {
        /// Id of the failed job
        id: JobId,
        /// Description written to the job's `last_error` field
        error: String,
    },
    /// The downloader is shutting down
    Shutdown,
}
