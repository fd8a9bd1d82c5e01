pub mod experiments;
pub mod health;
pub mod maintenance;
pub mod node_proxy;

use axum::Router;
use serde_json::Value;

use bioreactor_core::error::CoreError;
use bioreactor_transport::node::NodeResponse;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /experiments                     submit, list (forwarded to the node)
/// /experiments/{id}/status         status read-through
/// /experiments/{id}/logs           logs read-through
/// /experiments/{id}/results        results read-through
/// /experiments/{id}/download       archive fetched over the transport
/// /experiments/{id}/stop           stop read-through
/// /experiments/{id}                delete read-through
///
/// /maintenance/sweep               sweep read-through
///
/// /node/status                     hardware status passthrough
/// /node/sensors                    sensor sweep passthrough
/// /node/{led,ring-light,...}       actuator passthrough
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/experiments", experiments::router())
        .nest("/maintenance", maintenance::router())
        .nest("/node", node_proxy::router())
}

/// Unwrap a forwarded call, re-emitting node error envelopes with their
/// original status and folding transport failures into 502s.
pub(crate) fn relay(response: NodeResponse) -> AppResult<Value> {
    match response {
        NodeResponse::Ok(value) => Ok(value),
        NodeResponse::Empty => Err(AppError::Core(CoreError::Transport(
            "empty node response".into(),
        ))),
        NodeResponse::TransportError(reason) => {
            Err(AppError::Core(CoreError::Transport(reason)))
        }
        NodeResponse::DecodeError(reason) => Err(AppError::Core(CoreError::Transport(
            format!("invalid node response: {reason}"),
        ))),
        NodeResponse::ApplicationError(payload) => Err(AppError::from_node_payload(&payload)),
    }
}
