use super::{CreateOutcome, RecordStore, StoreError, StoreResult};
use crate::domain::share::{ShareCode, ShareRecord};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use time::OffsetDateTime;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(max_connections).acquire_timeout(acquire_timeout).connect(url).await
}

/// Applies the embedded schema migrations.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[derive(Debug, sqlx::FromRow)]
struct ShareRow {
    code: String,
    filename: String,
    file_url: String,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl TryFrom<ShareRow> for ShareRecord {
    type Error = StoreError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        let code = ShareCode::parse(&row.code).map_err(|e| StoreError::Corrupt(format!("{}: {e}", row.code)))?;
        Ok(Self {
            code,
            filename: row.filename,
            file_url: row.file_url,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgShareStore {
    pool: DbPool,
}

impl PgShareStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgShareStore {
    #[tracing::instrument(level = "debug", skip_all, fields(share.code = %record.code))]
    async fn create_if_absent(&self, record: &ShareRecord) -> StoreResult<CreateOutcome> {
        let result = sqlx::query(
            "INSERT INTO shares (code, filename, file_url, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(record.code.as_str())
        .bind(&record.filename)
        .bind(&record.file_url)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 { Ok(CreateOutcome::Conflict) } else { Ok(CreateOutcome::Created) }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn get(&self, code: &ShareCode) -> StoreResult<Option<ShareRecord>> {
        let row = sqlx::query_as::<_, ShareRow>(
            "SELECT code, filename, file_url, created_at, expires_at FROM shares WHERE code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShareRecord::try_from).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn exists(&self, code: &ShareCode) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shares WHERE code = $1)")
            .bind(code.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn set_expiration(
        &self,
        code: &ShareCode,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE shares SET expires_at = $2 WHERE code = $1 AND expires_at >= $3")
            .bind(code.as_str())
            .bind(expires_at)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(share.code = %code))]
    async fn delete(&self, code: &ShareCode) -> StoreResult<()> {
        sqlx::query("DELETE FROM shares WHERE code = $1").bind(code.as_str()).execute(&self.pool).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn purge_expired(&self, cutoff: OffsetDateTime, limit: usize) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM shares WHERE code IN (
                SELECT code FROM shares WHERE expires_at < $1 LIMIT $2
             )",
        )
        .bind(cutoff)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
