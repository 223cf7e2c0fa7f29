#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::storage::{S3UploadSigner, UploadSigner};
use crate::adapters::store::{MemoryShareStore, PgShareStore, RecordStore, RedisShareStore};
use crate::api::ServiceContainer;
use crate::config::{Config, StoreBackend};
use crate::services::clock::{Clock, SystemClock};
use crate::services::health_service::HealthService;
use crate::services::share_service::ShareService;
use crate::services::upload_service::UploadService;
use crate::workers::SharePurgeWorker;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background tasks that run for the lifetime of the server.
#[derive(Debug, Default)]
pub struct Workers {
    pub share_purge: Option<SharePurgeWorker>,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(worker) = self.share_purge {
            tasks.push(tokio::spawn(worker.run(shutdown_rx)));
        }
        tasks
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires services from already-connected infrastructure. Performs no I/O itself.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn RecordStore>>,
    signer: Option<Arc<dyn UploadSigner>>,
    clock: Arc<dyn Clock>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, store: None, signer: None, clock: Arc::new(SystemClock) }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Option<Arc<dyn UploadSigner>>) -> Self {
        self.signer = signer;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// # Errors
    /// Returns an error if no record store was supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let store = self.store.context("Record store is required")?;
        let store_timeout = Duration::from_millis(self.config.store.timeout_ms);

        let share_service =
            ShareService::new(Arc::clone(&store), Arc::clone(&self.clock), &self.config.shares, store_timeout);
        let upload_service = UploadService::new(self.signer.clone(), &self.config.storage);
        let health_service = HealthService::new(Arc::clone(&store), self.signer, self.config.health.clone());

        let share_purge = (self.config.purge.interval_secs > 0).then(|| {
            SharePurgeWorker::new(
                store,
                self.clock,
                self.config.purge.clone(),
                expired_retention(&self.config),
                store_timeout,
            )
        });

        Ok(App {
            services: ServiceContainer { share_service, upload_service },
            health_service,
            workers: Workers { share_purge },
        })
    }
}

fn expired_retention(config: &Config) -> time::Duration {
    time::Duration::seconds(i64::try_from(config.store.expired_retention_secs).unwrap_or(i64::MAX))
}

/// Connects the configured record store backend, applying migrations for Postgres.
///
/// # Errors
/// Returns an error if the backend's URL is missing or the connection cannot be established.
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let settings = &config.store;
    let store: Arc<dyn RecordStore> = match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory record store; shares are lost on restart");
            Arc::new(MemoryShareStore::new())
        }
        StoreBackend::Postgres => {
            let url = settings.database_url.as_deref().context("--database-url is required for the postgres backend")?;
            let acquire_timeout = Duration::from_millis(settings.timeout_ms);
            let pool = adapters::store::postgres::init_pool(url, settings.max_connections, acquire_timeout).await?;
            adapters::store::postgres::run_migrations(&pool).await?;
            Arc::new(PgShareStore::new(pool))
        }
        StoreBackend::Redis => {
            let url = settings.redis_url.as_deref().context("--redis-url is required for the redis backend")?;
            let conn = adapters::store::redis::connect(
                url,
                Duration::from_millis(settings.connect_min_backoff_ms),
                settings.connect_attempts,
            )
            .await?;
            Arc::new(RedisShareStore::new(conn, settings.key_prefix.clone(), expired_retention(config)))
        }
    };

    tracing::info!(backend = ?settings.backend, "Record store ready");
    Ok(store)
}

/// Builds the S3 upload signer, or `None` when no bucket is configured.
pub async fn connect_storage(config: &Config) -> Option<Arc<dyn UploadSigner>> {
    let Some(bucket) = config.storage.bucket.clone() else {
        tracing::info!("No S3 bucket configured; signed uploads are disabled");
        return None;
    };

    let client = adapters::storage::s3::initialize_s3_client(&config.storage).await;
    Some(Arc::new(S3UploadSigner::new(client, bucket, &config.storage)))
}

/// Routes panics through `tracing` before the default hook runs.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(|| "unknown".to_string(), ToString::to_string);
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.payload = %payload, "Panic occurred");
        default_hook(info);
    }));
}

/// Flips `shutdown_tx` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
