//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when draining), signing key id, admission backend
//! - `/metrics` : Prometheus text format

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Ready once state is built; reports which key signs and which backend
/// counts so a rollout can be checked from the outside.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    };
    let admission = state.admission().config();
    let body = Json(json!({
        "status": label,
        "kid": state.tokens().keys().kid(),
        "algorithm": state.tokens().config().algorithm,
        "admission_backend": if admission.distributed { "distributed" } else { "local" },
    }));
    (status, body)
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
