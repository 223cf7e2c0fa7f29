use crate::api::AppState;
use crate::api::schemas::shares::{
    CreateShareResponse, RetrieveParams, RetrieveResponse, UpdateExpirationResponse, UploadRequest,
};
use crate::domain::share::{Lookup, ShareCode};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};

fn parse_code(raw: Option<&str>) -> Result<ShareCode> {
    let raw = raw.filter(|c| !c.trim().is_empty()).ok_or_else(|| AppError::BadRequest("Missing file code.".into()))?;
    let code = ShareCode::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
    tracing::Span::current().record("share.code", code.as_str());
    Ok(code)
}

/// `POST /api/upload`: registers a new share, or re-times an existing one when `updateExpiration` is set.
pub async fn upload(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if request.update_expiration {
        let code = parse_code(request.code.as_deref())?;
        let record = state.share_service.update_expiration(&code, request.expiration.as_deref()).await?;
        return Ok(Json(UpdateExpirationResponse::from(record)).into_response());
    }

    let record = state
        .share_service
        .create(
            request.filename.as_deref().unwrap_or_default(),
            request.file_url.as_deref().unwrap_or_default(),
            request.expiration.as_deref(),
        )
        .await?;
    tracing::Span::current().record("share.code", record.code.as_str());

    Ok(Json(CreateShareResponse::from(record)).into_response())
}

/// `GET /api/retrieve?code=XXXXX`
pub async fn retrieve(
    State(state): State<AppState>,
    params: std::result::Result<Query<RetrieveParams>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let code = parse_code(params.code.as_deref())?;

    match state.share_service.lookup(&code).await? {
        Lookup::Live(record) => Ok(Json(RetrieveResponse::from(record))),
        Lookup::Expired => Err(AppError::Expired),
        Lookup::NotFound => Err(AppError::NotFound),
    }
}
