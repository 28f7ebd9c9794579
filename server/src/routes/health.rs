//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub uptime_seconds: u64,
    pub version: String,
}

/// GET /health - liveness and readiness signal.
///
/// Reports unhealthy (500) while the model is not loaded; the process
/// keeps serving this signal rather than exiting.
pub async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(HealthResponse {
            status: if ready { "healthy" } else { "unhealthy" },
            model_loaded: ready,
            uptime_seconds: state.uptime_seconds(),
            version: dermascan::VERSION.to_string(),
        }),
    )
}
