use crate::adapters::storage::{PresignedUpload, UploadSigner};
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;
use time::OffsetDateTime;

/// Builds an S3 client from storage settings, honoring custom endpoints and static credentials.
pub async fn initialize_s3_client(config: &StorageConfig) -> Client {
    let region_provider = aws_config::Region::new(config.region.clone());
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region_provider);

    if let Some(ref endpoint) = config.endpoint {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    if let (Some(ak), Some(sk)) = (&config.access_key, &config.secret_key) {
        let creds = aws_credential_types::Credentials::new(ak.clone(), sk.clone(), None, None, "static");
        config_loader = config_loader.credentials_provider(creds);
    }

    let sdk_config = config_loader.load().await;
    let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
    Client::from_conf(s3_config_builder.build())
}

#[derive(Clone, Debug)]
pub struct S3UploadSigner {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3UploadSigner {
    #[must_use]
    pub fn new(client: Client, bucket: String, config: &StorageConfig) -> Self {
        let public_base = match (&config.public_base_url, &config.endpoint) {
            (Some(base), _) => base.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
            (None, None) => format!("https://{bucket}.s3.{}.amazonaws.com", config.region),
        };
        Self { client, bucket, public_base }
    }
}

#[async_trait]
impl UploadSigner for S3UploadSigner {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn presign_put(&self, key: &str, ttl: Duration) -> Result<PresignedUpload> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| {
            tracing::error!(error = %e, "Invalid presigning lifetime");
            AppError::Internal
        })?;

        let request =
            self.client.put_object().bucket(&self.bucket).key(key).presigned(presigning).await.map_err(|e| {
                tracing::error!(error = ?e, key = %key, "S3 presign failed");
                AppError::Internal
            })?;

        Ok(PresignedUpload {
            url: request.uri().to_string(),
            method: request.method().to_string(),
            headers: request.headers().map(|(name, value)| (name.to_string(), value.to_string())).collect(),
            expires_at: OffsetDateTime::now_utc() + ttl,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }

    async fn check(&self) -> std::result::Result<(), String> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| format!("Storage connection failed for bucket {}: {e:?}", self.bucket))
    }
}
