use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "MediSync Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "ready",
        "storage": state.store.backend_name(),
        "realtimeSessions": state.events.session_count(),
    });
    (StatusCode::OK, Json(body))
}

/// Fallback for unknown routes, in the API error envelope.
pub async fn not_found() -> medisync_api::ApiError {
    medisync_api::ApiError::not_found("Route not found")
}
