use crate::domain::share::ShareRecord;
use crate::domain::timestamp::unix_millis;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/upload`.
///
/// One endpoint serves two operations: with `updateExpiration: true` it
/// re-times an existing share, otherwise it registers a new one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub expiration: Option<String>,
    pub code: Option<String>,
    #[serde(default)]
    pub update_expiration: bool,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveParams {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub code: String,
    pub filename: String,
    pub file_url: String,
    /// Unix epoch milliseconds
    pub expires_at: i64,
}

impl From<ShareRecord> for CreateShareResponse {
    fn from(record: ShareRecord) -> Self {
        Self {
            code: record.code.to_string(),
            filename: record.filename,
            file_url: record.file_url,
            expires_at: unix_millis(record.expires_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpirationResponse {
    pub code: String,
    pub expires_at: i64,
}

impl From<ShareRecord> for UpdateExpirationResponse {
    fn from(record: ShareRecord) -> Self {
        Self { code: record.code.to_string(), expires_at: unix_millis(record.expires_at) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResponse {
    pub filename: String,
    pub file_url: String,
    pub expires_at: i64,
}

impl From<ShareRecord> for RetrieveResponse {
    fn from(record: ShareRecord) -> Self {
        Self { filename: record.filename, file_url: record.file_url, expires_at: unix_millis(record.expires_at) }
    }
}
