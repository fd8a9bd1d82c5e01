//! Maintenance routes.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::routes::relay;
use crate::state::AppState;

fn default_max_age_hours() -> u64 {
    24
}

#[derive(Deserialize)]
pub struct SweepRequest {
    /// Remove experiments that finished more than this many hours ago.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

/// POST /api/maintenance/sweep
async fn sweep(
    State(state): State<AppState>,
    Json(input): Json<SweepRequest>,
) -> AppResult<impl IntoResponse> {
    let payload = relay(state.node.sweep(input.max_age_hours).await)?;
    Ok(Json(payload))
}

/// Maintenance routes, nested under `/api/maintenance`.
pub fn router() -> Router<AppState> {
    Router::new().route("/sweep", post(sweep))
}
