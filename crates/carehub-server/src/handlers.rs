use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use carehub_storage::Storage;
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<&'a str>,
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "service": "CareHub Hospital Management",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ai_online": state.triage.is_online(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            storage: None,
        }),
    )
}

/// Ready once the storage backend answers a ping.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.storage.backend_name();
    match state.storage.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                storage: Some(backend),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, backend, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    storage: Some(backend),
                }),
            )
        }
    }
}
