use crate::adapters::storage::UploadSigner;
use crate::adapters::store::RecordStore;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("codedrop-server");
        Self {
            status: meter
                .i64_gauge("codedrop_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn RecordStore>,
    signer: Option<Arc<dyn UploadSigner>>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, signer: Option<Arc<dyn UploadSigner>>, config: HealthConfig) -> Self {
        Self { store, signer, config, metrics: Metrics::new() }
    }

    /// Checks record store connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_store(&self) -> Result<(), String> {
        let store_timeout = Duration::from_millis(self.config.store_timeout_ms);

        let result = match timeout(store_timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Record store check failed: {e}")),
            Err(_) => Err("Record store check timed out".to_string()),
        };
        self.record("store", result.is_ok());
        result
    }

    /// Checks object storage connectivity. `None` when storage is not configured.
    pub async fn check_storage(&self) -> Option<Result<(), String>> {
        let signer = self.signer.as_ref()?;
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);

        let result = match timeout(storage_timeout, signer.check()).await {
            Ok(res) => res,
            Err(_) => Err("Storage connection timed out".to_string()),
        };
        self.record("storage", result.is_ok());
        Some(result)
    }

    fn record(&self, component: &'static str, ok: bool) {
        self.metrics.status.record(i64::from(ok), &[KeyValue::new("component", component)]);
    }
}
