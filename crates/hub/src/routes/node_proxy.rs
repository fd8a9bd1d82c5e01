//! Hardware passthrough routes.
//!
//! Operators reach the node's actuators and sensors through the hub
//! without a second network path to the node. Request bodies are forwarded
//! opaquely; validation stays on the node, next to the hardware.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::AppResult;
use crate::routes::relay;
use crate::state::AppState;

/// GET /api/node/status
async fn node_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.get_status().await)?;
    Ok(Json(payload))
}

/// GET /api/node/sensors
async fn node_sensors(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.get_sensors().await)?;
    Ok(Json(payload))
}

/// Forward an actuation payload to the given node endpoint.
async fn forward_control(
    state: &AppState,
    endpoint: &str,
    payload: Value,
) -> AppResult<Json<Value>> {
    let response = relay(state.node.control(endpoint, &payload).await)?;
    Ok(Json(response))
}

/// POST /api/node/led
async fn control_led(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    forward_control(&state, "/api/led", payload).await
}

/// POST /api/node/ring-light
async fn control_ring_light(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    forward_control(&state, "/api/ring-light", payload).await
}

/// POST /api/node/peltier
async fn control_peltier(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    forward_control(&state, "/api/peltier", payload).await
}

/// POST /api/node/pump
async fn control_pump(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    forward_control(&state, "/api/pump", payload).await
}

/// POST /api/node/stirrer
async fn control_stirrer(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    forward_control(&state, "/api/stirrer", payload).await
}

/// Node hardware passthrough routes, nested under `/api/node`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(node_status))
        .route("/sensors", get(node_sensors))
        .route("/led", post(control_led))
        .route("/ring-light", post(control_ring_light))
        .route("/peltier", post(control_peltier))
        .route("/pump", post(control_pump))
        .route("/stirrer", post(control_stirrer))
}
