//! Experiment routes: read-throughs to the node's experiment API.
//!
//! The hub holds no experiment state of its own. Success payloads from the
//! node (already in the `{ "data": ... }` envelope) are relayed verbatim;
//! error envelopes are re-emitted with the node's status code.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use bioreactor_core::types::ExperimentId;

use crate::error::AppResult;
use crate::routes::relay;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitExperimentRequest {
    /// The user script, executed on the node.
    pub script_content: String,
    /// Resource limits; the node applies defaults to omitted fields.
    pub config: Option<Value>,
}

/// POST /api/experiments
///
/// Forward the submission to the node and return the node-assigned id.
async fn submit_experiment(
    State(state): State<AppState>,
    Json(input): Json<SubmitExperimentRequest>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(
        state
            .node
            .submit_experiment(&input.script_content, input.config)
            .await,
    )?;
    tracing::info!(id = %payload["data"]["id"], "Experiment forwarded to node");
    Ok((StatusCode::ACCEPTED, Json(payload)))
}

/// GET /api/experiments
async fn list_experiments(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.list_experiments().await)?;
    Ok(Json(payload))
}

/// GET /api/experiments/{id}/status
async fn experiment_status(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.experiment_status(id).await)?;
    Ok(Json(payload))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    /// Return only the last N lines when set.
    pub tail: Option<usize>,
}

/// GET /api/experiments/{id}/logs?tail=
async fn experiment_logs(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
    Query(query): Query<LogsQuery>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.experiment_logs(id, query.tail).await)?;
    Ok(Json(payload))
}

/// GET /api/experiments/{id}/results
async fn experiment_results(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.experiment_results(id).await)?;
    Ok(Json(payload))
}

/// GET /api/experiments/{id}/download
///
/// Fetch the packaged archive through the transport and stream it back.
async fn download_results(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let bytes = state.node.fetch_archive(id).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"experiment_{id}_results.zip\""),
        ),
    ];
    Ok((headers, bytes))
}

/// POST /api/experiments/{id}/stop
async fn stop_experiment(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.stop_experiment(id).await)?;
    Ok(Json(payload))
}

/// DELETE /api/experiments/{id}
async fn delete_experiment(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    // The node answers a successful delete with 204 and no body. Only a
    // genuinely empty body counts; garbage is still a transport failure.
    match state.node.delete_experiment(id).await {
        bioreactor_transport::node::NodeResponse::Empty => Ok(StatusCode::NO_CONTENT),
        response => {
            relay(response)?;
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// Experiment routes, nested under `/api/experiments`.
///
/// ```text
/// POST   /                  -> submit_experiment
/// GET    /                  -> list_experiments
/// GET    /{id}/status       -> experiment_status
/// GET    /{id}/logs         -> experiment_logs
/// GET    /{id}/results      -> experiment_results
/// GET    /{id}/download     -> download_results
/// POST   /{id}/stop         -> stop_experiment
/// DELETE /{id}              -> delete_experiment
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_experiment).get(list_experiments))
        .route("/{id}/status", get(experiment_status))
        .route("/{id}/logs", get(experiment_logs))
        .route("/{id}/results", get(experiment_results))
        .route("/{id}/download", get(download_results))
        .route("/{id}/stop", post(stop_experiment))
        .route("/{id}", delete(delete_experiment))
}
