use crate::domain::share::{ShareCode, ShareRecord};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::MemoryShareStore;
pub use postgres::PgShareStore;
pub use self::redis::RedisShareStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store call timed out")]
    Timeout,
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed stored record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corrupt(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A record with the same code already exists; nothing was written.
    Conflict,
}

/// Durable home of share records, keyed by code.
///
/// Implementations provide key-level atomicity only. Expiry is never
/// evaluated here; callers decide liveness from `expires_at`.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug + 'static {
    /// Writes `record` only if no record with its code exists.
    async fn create_if_absent(&self, record: &ShareRecord) -> StoreResult<CreateOutcome>;

    async fn get(&self, code: &ShareCode) -> StoreResult<Option<ShareRecord>>;

    /// Returns `true` if any record (live or not yet purged) holds `code`.
    async fn exists(&self, code: &ShareCode) -> StoreResult<bool> {
        Ok(self.get(code).await?.is_some())
    }

    /// Replaces `expires_at` of the record under `code`, but only while that
    /// record exists and is live at `now`. Nothing else is rewritten.
    ///
    /// Returns `false` when no record qualified; an absent record is never created.
    async fn set_expiration(
        &self,
        code: &ShareCode,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<bool>;

    async fn delete(&self, code: &ShareCode) -> StoreResult<()>;

    /// Physically removes up to `limit` records that expired before `cutoff`.
    async fn purge_expired(&self, cutoff: OffsetDateTime, limit: usize) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Runs a store call with an upper bound on its duration.
///
/// # Errors
/// Returns `StoreError::Timeout` if `limit` elapses first, otherwise the call's own result.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, call).await.map_err(|_| StoreError::Timeout)?
}
