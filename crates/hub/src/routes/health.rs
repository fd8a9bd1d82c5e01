use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use bioreactor_transport::node::NodeResponse;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the node service answered its health probe.
    pub node_reachable: bool,
}

/// GET /health -- returns hub health including node reachability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let node_reachable = matches!(state.node.health().await, NodeResponse::Ok(_));
    let status = if node_reachable { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        node_reachable,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
