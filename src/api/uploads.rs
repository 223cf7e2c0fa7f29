use crate::api::AppState;
use crate::api::schemas::uploads::{UploadSignatureRequest, UploadSignatureResponse};
use crate::error::{AppError, Result};
use axum::{Json, body::Bytes, extract::State, response::IntoResponse};

/// `POST /api/get-upload-signature`. An empty body is accepted and yields a generic object name.
pub async fn get_upload_signature(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let request: UploadSignatureRequest = if body.iter().all(u8::is_ascii_whitespace) {
        UploadSignatureRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    let signed = state.upload_service.sign(request.filename.as_deref()).await?;
    Ok(Json(UploadSignatureResponse::from(signed)))
}
