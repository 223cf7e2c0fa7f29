use crate::adapters::storage::{PresignedUpload, UploadSigner};
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 128;

/// Signed parameters for one direct-to-storage upload.
#[derive(Debug, Clone)]
pub struct SignedUpload {
    pub key: String,
    pub file_url: String,
    pub upload: PresignedUpload,
}

/// Hands out presigned upload slots. The record store is never involved.
#[derive(Clone, Debug)]
pub struct UploadService {
    signer: Option<Arc<dyn UploadSigner>>,
    prefix: String,
    ttl: Duration,
}

impl UploadService {
    #[must_use]
    pub fn new(signer: Option<Arc<dyn UploadSigner>>, config: &StorageConfig) -> Self {
        Self {
            signer,
            prefix: config.upload_prefix.trim_matches('/').to_string(),
            ttl: Duration::from_secs(config.upload_url_ttl_secs),
        }
    }

    /// Allocates a unique object key for `filename` and signs an upload to it.
    ///
    /// # Errors
    /// Returns `AppError::StorageDisabled` if no object storage is configured.
    /// Returns `AppError::Internal` if signing fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(object.key = tracing::field::Empty))]
    pub async fn sign(&self, filename: Option<&str>) -> Result<SignedUpload> {
        let signer = self.signer.as_ref().ok_or(AppError::StorageDisabled)?;

        let name = sanitize_filename(filename.unwrap_or_default());
        let key = if self.prefix.is_empty() {
            format!("{}/{name}", Uuid::new_v4())
        } else {
            format!("{}/{}/{name}", self.prefix, Uuid::new_v4())
        };
        tracing::Span::current().record("object.key", key.as_str());

        let upload = signer.presign_put(&key, self.ttl).await?;
        let file_url = signer.public_url(&key);

        tracing::debug!(expires_at = %upload.expires_at, "Upload signed");
        Ok(SignedUpload { key, file_url, upload })
    }
}

/// Reduces a client-supplied name to `[A-Za-z0-9._-]`, never empty and never hidden.
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = cleaned.trim_start_matches('.');

    if trimmed.is_empty() { "file".to_string() } else { trimmed.to_string() }
}
