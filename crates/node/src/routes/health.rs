use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Hardware backend name.
    pub hardware_mode: &'static str,
    /// Whether actuator and sensor calls can be expected to succeed.
    pub hardware_available: bool,
}

/// GET /health -- returns service and hardware health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let hardware_available = state.hardware.available();
    let status = if hardware_available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        hardware_mode: state.hardware.mode(),
        hardware_available,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
