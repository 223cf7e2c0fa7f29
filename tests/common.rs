#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc, unreachable_pub)]
use clap::Parser;
use codedrop_server::adapters::storage::UploadSigner;
use codedrop_server::adapters::store::{MemoryShareStore, RecordStore};
use codedrop_server::api::{self, MgmtState};
use codedrop_server::config::Config;
use codedrop_server::services::clock::ManualClock;
use codedrop_server::{AppBuilder, connect_storage};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use time::OffsetDateTime;

static INIT: Once = Once::new();

/// 2026-01-01T00:00:00Z
pub const T0_UNIX: i64 = 1_767_225_600;
pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("codedrop_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::try_parse_from(["codedrop-server"]).unwrap();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.server.trusted_proxies = vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()];
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.purge.interval_secs = 0;
    config
}

/// Points storage at an address nothing listens on. Presigning is offline, so
/// signing works while the readiness probe for storage fails.
pub fn with_offline_storage(mut config: Config) -> Config {
    config.storage.bucket = Some("codedrop-test".to_string());
    config.storage.endpoint = Some("http://127.0.0.1:1".to_string());
    config.storage.access_key = Some("test-access".to_string());
    config.storage.secret_key = Some("test-secret".to_string());
    config.storage.force_path_style = true;
    config.storage.public_base_url = Some("https://cdn.codedrop.test".to_string());
    config.health.storage_timeout_ms = 500;
    config
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub clock: ManualClock,
    pub config: Config,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    /// Spawns against a fresh in-memory store.
    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with_store(config, Arc::new(MemoryShareStore::new())).await
    }

    pub async fn spawn_with_store(config: Config, store: Arc<dyn RecordStore>) -> Self {
        Self::spawn_with_store_at(config, store, OffsetDateTime::from_unix_timestamp(T0_UNIX).unwrap()).await
    }

    /// Backends with native key expiry need a clock near wall time.
    pub async fn spawn_with_store_at(config: Config, store: Arc<dyn RecordStore>, start: OffsetDateTime) -> Self {
        setup_tracing();

        let clock = ManualClock::new(start);
        let signer: Option<Arc<dyn UploadSigner>> = connect_storage(&config).await;

        let app = AppBuilder::new(config.clone())
            .with_store(store)
            .with_signer(signer)
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        let app_router = api::app_router(&config, app.services).unwrap();
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { server_url, mgmt_url, client: reqwest::Client::new(), clock, config }
    }

    pub fn advance(&self, by: time::Duration) {
        self.clock.advance(by);
    }

    pub fn now_ms(&self) -> i64 {
        use codedrop_server::services::clock::Clock;
        codedrop_server::domain::timestamp::unix_millis(self.clock.now())
    }

    pub async fn post_upload(&self, body: Value) -> reqwest::Response {
        self.client.post(format!("{}/api/upload", self.server_url)).json(&body).send().await.unwrap()
    }

    /// Registers a share and returns the response body. Panics unless the server answers 200.
    pub async fn create_share(&self, filename: &str, expiration: Option<&str>) -> Value {
        let mut body = json!({
            "filename": filename,
            "fileUrl": format!("https://files.codedrop.test/{filename}"),
        });
        if let Some(expiration) = expiration {
            body["expiration"] = json!(expiration);
        }

        let resp = self.post_upload(body).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn update_expiration(&self, code: &str, expiration: &str) -> reqwest::Response {
        self.post_upload(json!({ "code": code, "expiration": expiration, "updateExpiration": true })).await
    }

    pub async fn retrieve(&self, code: &str) -> reqwest::Response {
        self.client.get(format!("{}/api/retrieve?code={code}", self.server_url)).send().await.unwrap()
    }
}
