use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks the record store and, when configured, object storage.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (store_res, storage_res) =
        tokio::join!(state.health_service.check_store(), state.health_service.check_storage());

    let mut status_code = StatusCode::OK;
    let store_status = if let Err(e) = store_res {
        tracing::warn!(error = %e, component = "store", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let storage_status = match storage_res {
        None => "disabled",
        Some(Ok(())) => "ok",
        Some(Err(e)) => {
            tracing::warn!(error = %e, component = "storage", "Readiness probe failed");
            status_code = StatusCode::SERVICE_UNAVAILABLE;
            "error"
        }
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        store: store_status.to_string(),
        storage: storage_status.to_string(),
    };

    (status_code, Json(response))
}
