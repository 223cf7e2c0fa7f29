use crate::adapters::store::{RecordStore, StoreResult, bounded};
use crate::config::PurgeConfig;
use crate::services::clock::Clock;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    purged: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("codedrop-server");
        Self {
            purged: meter
                .u64_counter("shares_purged_total")
                .with_description("Total number of long-expired share records removed")
                .build(),
            errors: meter
                .u64_counter("share_purge_errors_total")
                .with_description("Total number of failed purge cycles")
                .build(),
        }
    }
}

/// Physically removes records that expired longer ago than the retention window.
///
/// Reads never depend on this worker; it only keeps the store from growing.
#[derive(Debug)]
pub struct SharePurgeWorker {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: PurgeConfig,
    retention: time::Duration,
    store_timeout: StdDuration,
    metrics: Metrics,
}

impl SharePurgeWorker {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        config: PurgeConfig,
        retention: time::Duration,
        store_timeout: StdDuration,
    ) -> Self {
        Self { store, clock, config, retention, store_timeout, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let interval = StdDuration::from_secs(self.config.interval_secs);
        let mut next_tick = tokio::time::Instant::now() + interval;

        while !*shutdown.borrow() {
            tokio::select! {
                () = tokio::time::sleep_until(next_tick) => {
                    async {
                        match self.purge_all().await {
                            Ok(count) => {
                                if count > 0 {
                                    self.metrics.purged.add(count, &[]);
                                }
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Share purge cycle failed");
                                self.metrics.errors.add(1, &[]);
                            }
                        }
                    }
                    .instrument(tracing::info_span!("share_purge_iteration"))
                    .await;
                    next_tick = tokio::time::Instant::now() + interval;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Share purge loop shutting down...");
    }

    /// Purges in batches until a short batch shows nothing is left.
    async fn purge_all(&self) -> StoreResult<u64> {
        let Some(cutoff) = self.clock.now().checked_sub(self.retention) else {
            // Nothing can have expired before the earliest representable instant.
            return Ok(0);
        };
        let batch_size = self.config.batch_size.max(1);
        let full_batch = u64::try_from(batch_size).unwrap_or(u64::MAX);
        let mut total = 0;

        loop {
            let removed = bounded(self.store_timeout, self.store.purge_expired(cutoff, batch_size)).await?;
            total += removed;
            if removed < full_batch {
                break;
            }
        }

        if total > 0 {
            tracing::info!(purged = total, "Purged long-expired shares");
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MemoryShareStore;
    use crate::domain::share::{ShareCode, ShareRecord};
    use crate::services::clock::ManualClock;
    use time::{Duration, OffsetDateTime};

    async fn seed(store: &MemoryShareStore, code: &str, expires_at: OffsetDateTime) {
        let record = ShareRecord {
            code: ShareCode::parse(code).unwrap(),
            filename: "f".into(),
            file_url: "https://x/f".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            expires_at,
        };
        store.create_if_absent(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_keeps_records_inside_retention() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(10);
        let store = MemoryShareStore::new();
        seed(&store, "GONE1", now - Duration::days(3)).await;
        seed(&store, "GONE2", now - Duration::days(2)).await;
        seed(&store, "KEPT1", now - Duration::hours(2)).await;
        seed(&store, "LIVE1", now + Duration::hours(2)).await;

        let worker = SharePurgeWorker::new(
            Arc::new(store.clone()),
            Arc::new(ManualClock::new(now)),
            PurgeConfig { interval_secs: 60, batch_size: 1 },
            Duration::days(1),
            StdDuration::from_secs(1),
        );

        assert_eq!(worker.purge_all().await.unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert!(store.exists(&ShareCode::parse("KEPT1").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_retention_purges_nothing() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(10);
        let store = MemoryShareStore::new();
        seed(&store, "OLD01", OffsetDateTime::UNIX_EPOCH).await;

        let worker = SharePurgeWorker::new(
            Arc::new(store.clone()),
            Arc::new(ManualClock::new(now)),
            PurgeConfig { interval_secs: 60, batch_size: 10 },
            Duration::MAX,
            StdDuration::from_secs(1),
        );

        assert_eq!(worker.purge_all().await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let worker = SharePurgeWorker::new(
            Arc::new(MemoryShareStore::new()),
            Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH)),
            PurgeConfig { interval_secs: 3600, batch_size: 10 },
            Duration::days(1),
            StdDuration::from_secs(1),
        );
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(worker.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(StdDuration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
