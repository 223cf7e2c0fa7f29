use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use time::OffsetDateTime;

pub mod s3;

pub use s3::S3UploadSigner;

/// Everything a client needs to send one object straight to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait UploadSigner: Send + Sync + std::fmt::Debug + 'static {
    /// Signs a single `PUT` of `key`, valid for `ttl`.
    async fn presign_put(&self, key: &str, ttl: Duration) -> Result<PresignedUpload>;

    /// Where the object under `key` is served once uploaded.
    fn public_url(&self, key: &str) -> String;

    /// Verifies the bucket is reachable.
    async fn check(&self) -> std::result::Result<(), String>;
}
