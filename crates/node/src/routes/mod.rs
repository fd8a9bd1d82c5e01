pub mod experiments;
pub mod hardware;
pub mod health;
pub mod maintenance;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /status                          hardware status
/// /sensors/all                     full sensor sweep
/// /sensors/photodiodes             photodiode readings
/// /sensors/temperature             vial + io temperatures
/// /sensors/current                 peltier supply current
/// /led                             LED on/off
/// /ring-light                      ring light color
/// /peltier                         peltier power + direction
/// /pump                            pump flow rate
/// /stirrer                         stirrer duty cycle
///
/// /experiments                     submit, list
/// /experiments/{id}/status         status
/// /experiments/{id}/logs           captured output
/// /experiments/{id}/results        output file listing
/// /experiments/{id}/download       results archive
/// /experiments/{id}/stop           graceful stop
/// /experiments/{id}                delete
///
/// /maintenance/sweep               remove old experiments
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(hardware::router())
        .nest("/experiments", experiments::router())
        .nest("/maintenance", maintenance::router())
}
