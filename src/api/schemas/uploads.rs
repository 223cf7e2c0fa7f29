use crate::domain::timestamp::unix_millis;
use crate::services::upload_service::SignedUpload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct UploadSignatureRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignatureResponse {
    pub upload_url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub key: String,
    pub file_url: String,
    pub expires_at: i64,
}

impl From<SignedUpload> for UploadSignatureResponse {
    fn from(signed: SignedUpload) -> Self {
        Self {
            upload_url: signed.upload.url,
            method: signed.upload.method,
            headers: signed.upload.headers.into_iter().collect(),
            key: signed.key,
            file_url: signed.file_url,
            expires_at: unix_millis(signed.upload.expires_at),
        }
    }
}
