use crate::adapters::store::{CreateOutcome, RecordStore, bounded};
use crate::config::ShareConfig;
use crate::domain::expiration::ExpirationSelector;
use crate::domain::share::{Lookup, ShareCode, ShareRecord};
use crate::error::{AppError, Result};
use crate::services::clock::Clock;
use crate::services::code_generator::{CodeGenerator, CodeSource, RandomCodeSource};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    created: Counter<u64>,
    create_conflicts: Counter<u64>,
    lookups: Counter<u64>,
    expiration_updates: Counter<u64>,
    expired_delete_failures: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("codedrop-server");
        Self {
            created: meter.u64_counter("shares_created_total").with_description("Share records created").build(),
            create_conflicts: meter
                .u64_counter("share_create_conflicts_total")
                .with_description("Creates rejected by the store because the code was claimed concurrently")
                .build(),
            lookups: meter
                .u64_counter("share_lookups_total")
                .with_description("Share code lookups by outcome")
                .build(),
            expiration_updates: meter
                .u64_counter("share_expiration_updates_total")
                .with_description("Successful expiration updates")
                .build(),
            expired_delete_failures: meter
                .u64_counter("share_expired_deletes_failed_total")
                .with_description("Best-effort deletes of expired records that failed")
                .build(),
        }
    }
}

/// Creates, extends, and resolves share records.
///
/// Every read re-checks `expires_at` against the clock, so an expired record
/// is never served even when its physical deletion is late or fails.
#[derive(Clone, Debug)]
pub struct ShareService {
    store: Arc<dyn RecordStore>,
    generator: CodeGenerator,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    metrics: Metrics,
}

impl ShareService {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: &ShareConfig, store_timeout: Duration) -> Self {
        Self::with_code_source(store, clock, Arc::new(RandomCodeSource), config, store_timeout)
    }

    #[must_use]
    pub fn with_code_source(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn CodeSource>,
        config: &ShareConfig,
        store_timeout: Duration,
    ) -> Self {
        let generator = CodeGenerator::new(source, Arc::clone(&store), config.max_code_attempts, store_timeout);
        Self { store, generator, clock, store_timeout, metrics: Metrics::new() }
    }

    /// Mints a fresh code and persists a new share record for it.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if `filename` or `file_url` is blank.
    /// Returns `AppError::CodeSpaceExhausted` if no free code was claimed within the attempt budget.
    /// Returns `AppError::StoreUnavailable` if the store fails or times out.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, filename, file_url),
        fields(share.code = tracing::field::Empty)
    )]
    pub async fn create(&self, filename: &str, file_url: &str, selector: Option<&str>) -> Result<ShareRecord> {
        if filename.trim().is_empty() {
            return Err(AppError::BadRequest("filename is required".into()));
        }
        if file_url.trim().is_empty() {
            return Err(AppError::BadRequest("fileUrl is required".into()));
        }

        let expiration = ExpirationSelector::parse(selector);
        // One budget covers both taken candidates and lost create races.
        let mut budget = self.generator.max_attempts();

        loop {
            let code = self.generator.generate(&mut budget).await?;
            let now = self.clock.now();
            let record = ShareRecord {
                code,
                filename: filename.to_string(),
                file_url: file_url.to_string(),
                created_at: now,
                expires_at: expiration.expires_at(now),
            };

            match bounded(self.store_timeout, self.store.create_if_absent(&record)).await? {
                CreateOutcome::Created => {
                    tracing::Span::current().record("share.code", tracing::field::display(&record.code));
                    tracing::info!(expires_at = %record.expires_at, "Share created");
                    self.metrics.created.add(1, &[]);
                    return Ok(record);
                }
                CreateOutcome::Conflict => {
                    tracing::debug!(
                        share.code = %record.code,
                        remaining = budget,
                        "Code claimed concurrently, drawing another"
                    );
                    self.metrics.create_conflicts.add(1, &[]);
                }
            }
        }
    }

    /// Re-anchors a live record's expiration at the current time.
    ///
    /// Expired records are never extended: they answer `NotFound` like absent ones.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no live record holds `code`.
    /// Returns `AppError::StoreUnavailable` if the store fails or times out.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(share.code = %code))]
    pub async fn update_expiration(&self, code: &ShareCode, selector: Option<&str>) -> Result<ShareRecord> {
        let now = self.clock.now();
        let mut record = match bounded(self.store_timeout, self.store.get(code)).await? {
            Some(record) if record.is_live_at(now) => record,
            Some(_) => {
                self.evict(code).await;
                return Err(AppError::NotFound);
            }
            None => return Err(AppError::NotFound),
        };

        let expires_at = ExpirationSelector::parse(selector).expires_at(now);
        // Conditional write: a record deleted or expired since the read stays gone.
        if !bounded(self.store_timeout, self.store.set_expiration(code, expires_at, now)).await? {
            tracing::debug!("Share disappeared before its expiration could be updated");
            return Err(AppError::NotFound);
        }
        record.expires_at = expires_at;

        tracing::info!(expires_at = %record.expires_at, "Share expiration updated");
        self.metrics.expiration_updates.add(1, &[]);
        Ok(record)
    }

    /// Resolves a code, evicting the record if it turns out to be expired.
    ///
    /// # Errors
    /// Returns `AppError::StoreUnavailable` if the read fails or times out.
    /// A failed eviction is logged and never surfaced.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(share.code = %code, outcome = tracing::field::Empty))]
    pub async fn lookup(&self, code: &ShareCode) -> Result<Lookup> {
        let now = self.clock.now();
        let lookup = match bounded(self.store_timeout, self.store.get(code)).await? {
            None => Lookup::NotFound,
            Some(record) if record.is_expired_at(now) => {
                self.evict(code).await;
                Lookup::Expired
            }
            Some(record) => Lookup::Live(record),
        };

        tracing::Span::current().record("outcome", lookup.outcome());
        self.metrics.lookups.add(1, &[KeyValue::new("outcome", lookup.outcome())]);
        Ok(lookup)
    }

    async fn evict(&self, code: &ShareCode) {
        if let Err(e) = bounded(self.store_timeout, self.store.delete(code)).await {
            tracing::warn!(error = %e, share.code = %code, "Failed to delete expired share");
            self.metrics.expired_delete_failures.add(1, &[]);
        } else {
            tracing::debug!(share.code = %code, "Deleted expired share");
        }
    }
}
