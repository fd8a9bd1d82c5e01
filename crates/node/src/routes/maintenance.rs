//! Maintenance routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

fn default_max_age_hours() -> i64 {
    24
}

#[derive(Deserialize)]
pub struct SweepRequest {
    /// Remove experiments that finished more than this many hours ago.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub removed_count: usize,
}

/// POST /api/maintenance/sweep
///
/// Remove experiments whose `end_time` predates the cutoff, together with
/// their working directories.
async fn sweep(
    State(state): State<AppState>,
    Json(input): Json<SweepRequest>,
) -> AppResult<Json<DataResponse<SweepResponse>>> {
    if input.max_age_hours < 0 {
        return Err(AppError::BadRequest(format!(
            "max_age_hours must be non-negative, got {}",
            input.max_age_hours
        )));
    }
    // try_hours: Duration::hours panics when the value overflows.
    let max_age = chrono::Duration::try_hours(input.max_age_hours).ok_or_else(|| {
        AppError::BadRequest(format!(
            "max_age_hours out of range: {}",
            input.max_age_hours
        ))
    })?;

    let removed_count = state.manager.sweep(max_age).await;

    Ok(Json(DataResponse {
        data: SweepResponse { removed_count },
    }))
}

/// Maintenance routes, nested under `/api/maintenance`.
pub fn router() -> Router<AppState> {
    Router::new().route("/sweep", post(sweep))
}
