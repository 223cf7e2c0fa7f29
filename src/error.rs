use crate::adapters::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found")]
    NotFound,
    #[error("Share has expired")]
    Expired,
    #[error("Could not allocate a free share code")]
    CodeSpaceExhausted,
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("File storage is not configured")]
    StorageDisabled,
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::NotFound => {
                tracing::debug!("Share not found");
                (StatusCode::NOT_FOUND, "File not found for this code.".to_string())
            }
            Self::Expired => {
                tracing::debug!("Share expired");
                let body = Json(json!({
                    "error": "This file has expired and is no longer available.",
                    "expired": true
                }));
                return (StatusCode::GONE, body).into_response();
            }
            Self::CodeSpaceExhausted => {
                tracing::error!("Share code generation exhausted its attempts");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Record store error");
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            Self::StorageDisabled => {
                tracing::debug!("Signed upload requested without storage configured");
                (StatusCode::SERVICE_UNAVAILABLE, "File storage is not configured".to_string())
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
