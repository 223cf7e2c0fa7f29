use super::{CreateOutcome, RecordStore, StoreError, StoreResult};
use crate::domain::share::{ShareCode, ShareRecord};
use crate::domain::timestamp::{from_unix_millis, unix_millis};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Opens a managed connection, retrying with exponential backoff while Redis comes up.
///
/// # Errors
/// Returns an error if the URL is invalid or every attempt fails.
pub async fn connect(url: &str, min_backoff: Duration, attempts: usize) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(url)?;
    let retry_strategy = ExponentialBuilder::default().with_min_delay(min_backoff).with_max_times(attempts);

    let manager = (|| async { client.get_connection_manager().await })
        .retry(retry_strategy)
        .notify(|e, duration| {
            tracing::warn!(error = %e, "Redis connection failed, retrying in {:?}", duration);
        })
        .await?;

    Ok(manager)
}

/// Replaces the value only if it still equals the one the caller read.
const SWAP_IF_UNCHANGED: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PXAT', ARGV[3])
    return 1
end
return 0
";

/// Lost swaps tolerated before an expiration update gives up.
const SWAP_ATTEMPTS: usize = 3;

/// Epoch millis at which Redis may drop a record. Saturates instead of overflowing.
fn retain_until_ms(expires_at: OffsetDateTime, retention: time::Duration) -> i64 {
    let until = expires_at.checked_add(retention).unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
    unix_millis(until)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredShare {
    code: String,
    filename: String,
    file_url: String,
    created_at_ms: i64,
    expires_at_ms: i64,
}

impl From<&ShareRecord> for StoredShare {
    fn from(record: &ShareRecord) -> Self {
        Self {
            code: record.code.to_string(),
            filename: record.filename.clone(),
            file_url: record.file_url.clone(),
            created_at_ms: unix_millis(record.created_at),
            expires_at_ms: unix_millis(record.expires_at),
        }
    }
}

impl TryFrom<StoredShare> for ShareRecord {
    type Error = StoreError;

    fn try_from(stored: StoredShare) -> Result<Self, Self::Error> {
        let code =
            ShareCode::parse(&stored.code).map_err(|e| StoreError::Corrupt(format!("{}: {e}", stored.code)))?;
        let instant = |millis: i64| {
            from_unix_millis(millis).ok_or_else(|| StoreError::Corrupt(format!("timestamp {millis} out of range")))
        };
        Ok(Self {
            code,
            filename: stored.filename,
            file_url: stored.file_url,
            created_at: instant(stored.created_at_ms)?,
            expires_at: instant(stored.expires_at_ms)?,
        })
    }
}

/// Share records as JSON strings under `{prefix}{code}`.
///
/// Each key carries a native expiry of `expires_at + retention`, so Redis
/// reclaims records on its own once reads no longer need to report them as expired.
#[derive(Clone)]
pub struct RedisShareStore {
    conn: ConnectionManager,
    prefix: String,
    retention: time::Duration,
    swap: Script,
}

impl std::fmt::Debug for RedisShareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisShareStore").field("prefix", &self.prefix).field("retention", &self.retention).finish()
    }
}

impl RedisShareStore {
    #[must_use]
    pub fn new(conn: ConnectionManager, prefix: String, retention: time::Duration) -> Self {
        Self { conn, prefix, retention, swap: Script::new(SWAP_IF_UNCHANGED) }
    }

    fn key(&self, code: &ShareCode) -> String {
        format!("{}{code}", self.prefix)
    }
}

#[async_trait]
impl RecordStore for RedisShareStore {
    #[tracing::instrument(level = "debug", skip_all, fields(share.code = %record.code))]
    async fn create_if_absent(&self, record: &ShareRecord) -> StoreResult<CreateOutcome> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&StoredShare::from(record))?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(&record.code))
            .arg(payload)
            .arg("NX")
            .arg("PXAT")
            .arg(retain_until_ms(record.expires_at, self.retention))
            .query_async(&mut conn)
            .await?;

        Ok(if reply.is_some() { CreateOutcome::Created } else { CreateOutcome::Conflict })
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn get(&self, code: &ShareCode) -> StoreResult<Option<ShareRecord>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(self.key(code)).await?;

        payload
            .map(|raw| serde_json::from_str::<StoredShare>(&raw).map_err(StoreError::from).and_then(ShareRecord::try_from))
            .transpose()
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn exists(&self, code: &ShareCode) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(self.key(code)).await?;
        Ok(found)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn set_expiration(
        &self,
        code: &ShareCode,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let key = self.key(code);

        for attempt in 1..=SWAP_ATTEMPTS {
            let Some(raw): Option<String> = conn.get(&key).await? else {
                return Ok(false);
            };
            let mut record = ShareRecord::try_from(serde_json::from_str::<StoredShare>(&raw)?)?;
            if !record.is_live_at(now) {
                return Ok(false);
            }
            record.expires_at = expires_at;

            let swapped: i64 = self
                .swap
                .key(&key)
                .arg(&raw)
                .arg(serde_json::to_string(&StoredShare::from(&record))?)
                .arg(retain_until_ms(expires_at, self.retention))
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                return Ok(true);
            }
            tracing::debug!(attempt, "Record changed during expiration update, re-reading");
        }

        Err(StoreError::Backend(format!("record {code} kept changing during expiration update")))
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn delete(&self, code: &ShareCode) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(code)).await?;
        Ok(())
    }

    async fn purge_expired(&self, _cutoff: OffsetDateTime, _limit: usize) -> StoreResult<u64> {
        // Keys expire natively.
        Ok(0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_share_keeps_millisecond_precision() {
        let record = ShareRecord {
            code: ShareCode::parse("Q7Z2K").unwrap(),
            filename: "report.pdf".into(),
            file_url: "https://files.example/report.pdf".into(),
            created_at: OffsetDateTime::UNIX_EPOCH + time::Duration::milliseconds(1_700_000_000_123),
            expires_at: OffsetDateTime::UNIX_EPOCH + time::Duration::milliseconds(1_700_003_600_123),
        };

        let json = serde_json::to_string(&StoredShare::from(&record)).unwrap();
        let decoded = ShareRecord::try_from(serde_json::from_str::<StoredShare>(&json).unwrap()).unwrap();

        assert!(json.contains("\"fileUrl\""));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_retention_deadline_saturates() {
        let expires_at = OffsetDateTime::UNIX_EPOCH + time::Duration::hours(1);

        assert_eq!(retain_until_ms(expires_at, time::Duration::days(1)), 25 * 3_600_000);
        assert_eq!(
            retain_until_ms(expires_at, time::Duration::MAX),
            unix_millis(PrimitiveDateTime::MAX.assume_utc())
        );
    }

    #[test]
    fn test_stored_share_with_bad_code_is_corrupt() {
        let stored = StoredShare {
            code: "nope".into(),
            filename: String::new(),
            file_url: String::new(),
            created_at_ms: 0,
            expires_at_ms: 0,
        };

        assert!(matches!(ShareRecord::try_from(stored), Err(StoreError::Corrupt(_))));
    }
}
