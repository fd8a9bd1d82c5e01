//! Experiment lifecycle routes.
//!
//! Stateless façade over [`ExperimentManager`]: submission creates the
//! record and fires the container launch in the background, so the caller
//! gets the id immediately and polls `/status` for progress.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use bioreactor_core::config::ExperimentConfig;
use bioreactor_core::types::{ExperimentId, ExperimentStatus};
use bioreactor_runtime::archive;
use bioreactor_runtime::manager::STOP_GRACE;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitExperimentRequest {
    /// The user script, executed as `/workspace/script.py`.
    pub script_content: String,
    /// Resource limits; defaults apply to any omitted field.
    #[serde(default)]
    pub config: ExperimentConfig,
}

#[derive(Serialize)]
pub struct SubmittedExperiment {
    pub id: ExperimentId,
    pub status: ExperimentStatus,
}

/// POST /api/experiments
///
/// Create the experiment and launch its container in the background.
/// Returns 202 with the id immediately; launch failures are recorded on
/// the experiment and observable via `/status`.
async fn submit_experiment(
    State(state): State<AppState>,
    Json(input): Json<SubmitExperimentRequest>,
) -> AppResult<impl IntoResponse> {
    let id = state
        .manager
        .create(&input.script_content, input.config)
        .await?;

    let manager = Arc::clone(&state.manager);
    tokio::spawn(async move {
        if let Err(e) = manager.start(id).await {
            tracing::error!(id = %id, error = %e, "Background experiment start failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedExperiment {
                id,
                status: ExperimentStatus::Created,
            },
        }),
    ))
}

/// GET /api/experiments
async fn list_experiments(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let experiments = state.manager.list().await;
    Ok(Json(DataResponse { data: experiments }))
}

/// GET /api/experiments/{id}/status
async fn experiment_status(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let summary = state.manager.get_status(id).await?;
    Ok(Json(DataResponse { data: summary }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    /// Return only the last N lines when set.
    pub tail: Option<usize>,
}

#[derive(Serialize)]
pub struct ExperimentLogs {
    pub logs: String,
}

/// GET /api/experiments/{id}/logs?tail=
async fn experiment_logs(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
    Query(query): Query<LogsQuery>,
) -> AppResult<impl IntoResponse> {
    let logs = state.manager.logs(id, query.tail).await?;
    Ok(Json(DataResponse {
        data: ExperimentLogs { logs },
    }))
}

/// GET /api/experiments/{id}/results
async fn experiment_results(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let results = state.manager.results(id).await?;
    Ok(Json(DataResponse { data: results }))
}

/// GET /api/experiments/{id}/download
///
/// Package the results on demand and stream the zip back.
async fn download_results(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    let archive_path = state.manager.package(id).await?;
    let bytes = tokio::fs::read(&archive_path)
        .await
        .map_err(|e| AppError::InternalError(format!("reading results archive: {e}")))?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", archive::download_filename(id)),
        ),
    ];
    Ok((headers, bytes))
}

/// POST /api/experiments/{id}/stop
async fn stop_experiment(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    state.manager.stop(id, STOP_GRACE).await?;
    let summary = state.manager.get_status(id).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// DELETE /api/experiments/{id}
async fn delete_experiment(
    State(state): State<AppState>,
    Path(id): Path<ExperimentId>,
) -> AppResult<impl IntoResponse> {
    state.manager.cleanup(id).await?;
    Ok(StatusCode::NO_CONTENT)
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
