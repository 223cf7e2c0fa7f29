use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

/// Ten years. Keeps `expires_at + retention` well inside the representable date range.
pub const MAX_EXPIRED_RETENTION_SECS: u64 = 10 * 365 * 86_400;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub shares: ShareConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub purge: PurgeConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "CODEDROP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "CODEDROP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "CODEDROP_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks after a shutdown signal
    #[arg(long, env = "CODEDROP_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Upper bound on a single request, in seconds
    #[arg(long, env = "CODEDROP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "CODEDROP_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Process-local map; for development and tests
    #[default]
    Memory,
    Postgres,
    Redis,
}

#[derive(Clone, Debug, Args)]
pub struct StoreConfig {
    /// Which record store holds share records
    #[arg(long = "store-backend", env = "CODEDROP_STORE_BACKEND", value_enum, default_value_t = StoreBackend::Memory)]
    pub backend: StoreBackend,

    /// Postgres connection URL (postgres backend)
    #[arg(long, env = "CODEDROP_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled Postgres connections
    #[arg(long, env = "CODEDROP_DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Redis connection URL (redis backend)
    #[arg(long, env = "CODEDROP_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Key prefix for share records in Redis
    #[arg(long, env = "CODEDROP_REDIS_KEY_PREFIX", default_value = "share:")]
    pub key_prefix: String,

    /// Upper bound on any single store call, in milliseconds
    #[arg(long = "store-timeout-ms", env = "CODEDROP_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// How long an expired record is physically kept so reads can still report it as expired (at most 10 years)
    #[arg(
        long,
        env = "CODEDROP_EXPIRED_RETENTION_SECS",
        default_value_t = 86_400,
        value_parser = clap::value_parser!(u64).range(..=MAX_EXPIRED_RETENTION_SECS)
    )]
    pub expired_retention_secs: u64,

    /// Initial backoff between startup connection attempts, in milliseconds
    #[arg(long, env = "CODEDROP_STORE_CONNECT_MIN_BACKOFF_MS", default_value_t = 200)]
    pub connect_min_backoff_ms: u64,

    /// Number of startup connection attempts before giving up
    #[arg(long, env = "CODEDROP_STORE_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub connect_attempts: usize,
}

#[derive(Clone, Debug, Args)]
pub struct ShareConfig {
    /// Maximum attempts to mint a code that is not already taken
    #[arg(long, env = "CODEDROP_MAX_CODE_ATTEMPTS", default_value_t = 10)]
    pub max_code_attempts: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self { max_code_attempts: 10 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// S3 bucket for uploaded files; signed uploads are disabled when unset
    #[arg(long = "s3-bucket", env = "CODEDROP_S3_BUCKET")]
    pub bucket: Option<String>,

    /// S3 region
    #[arg(long = "s3-region", env = "CODEDROP_S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long = "s3-endpoint", env = "CODEDROP_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 access key
    #[arg(long = "s3-access-key", env = "CODEDROP_S3_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long = "s3-secret-key", env = "CODEDROP_S3_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long = "s3-force-path-style", env = "CODEDROP_S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,

    /// Public base URL under which uploaded objects are served (e.g. a CDN)
    #[arg(long, env = "CODEDROP_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Key prefix (folder) for uploaded objects
    #[arg(long, env = "CODEDROP_UPLOAD_PREFIX", default_value = "uploads")]
    pub upload_prefix: String,

    /// Lifetime of a presigned upload URL in seconds
    #[arg(long, env = "CODEDROP_UPLOAD_URL_TTL_SECS", default_value_t = 900)]
    pub upload_url_ttl_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client IP
    #[arg(long, env = "CODEDROP_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance per client IP
    #[arg(long, env = "CODEDROP_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the record store readiness check
    #[arg(long, env = "CODEDROP_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// Timeout for the object storage readiness check
    #[arg(long, env = "CODEDROP_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct PurgeConfig {
    /// How often to purge long-expired records (0 disables the worker)
    #[arg(long = "purge-interval-secs", env = "CODEDROP_PURGE_INTERVAL_SECS", default_value_t = 3600)]
    pub interval_secs: u64,

    /// Maximum records removed per purge batch
    #[arg(long = "purge-batch-size", env = "CODEDROP_PURGE_BATCH_SIZE", default_value_t = 500)]
    pub batch_size: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP/HTTP collector endpoint; export is disabled when unset
    #[arg(long, env = "CODEDROP_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "CODEDROP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_without_arguments() {
        let config = Config::try_parse_from(["codedrop-server"]).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.shares.max_code_attempts, 10);
        assert_eq!(config.store.timeout_ms, 2000);
        assert!(config.storage.bucket.is_none());
        assert_eq!(config.server.trusted_proxies.len(), 4);
    }

    #[test]
    fn test_backend_flag() {
        let config = Config::try_parse_from([
            "codedrop-server",
            "--store-backend",
            "redis",
            "--redis-url",
            "redis://localhost:6379",
        ])
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_expired_retention_is_capped() {
        let at_cap = MAX_EXPIRED_RETENTION_SECS.to_string();
        let config =
            Config::try_parse_from(["codedrop-server", "--expired-retention-secs", at_cap.as_str()]).unwrap();
        assert_eq!(config.store.expired_retention_secs, MAX_EXPIRED_RETENTION_SECS);

        let result = Config::try_parse_from(["codedrop-server", "--expired-retention-secs", "18446744073709551615"]);
        assert!(result.is_err());
    }
}
