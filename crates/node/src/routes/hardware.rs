//! Hardware control and sensor routes.
//!
//! Thin HTTP glue over the [`Hardware`](crate::hardware::Hardware)
//! trait: validate the request,
//! forward to the backend, wrap the result in the `{ "data": ... }`
//! envelope.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::hardware::{SensorSnapshot, TemperatureReadings};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LedRequest {
    pub state: bool,
}

#[derive(Deserialize)]
pub struct RingLightRequest {
    /// RGB triple, each component 0-255.
    pub color: [u8; 3],
    /// Single pixel index; whole ring when absent.
    pub pixel: Option<u32>,
}

#[derive(Deserialize)]
pub struct PeltierRequest {
    /// Drive power in percent (0-100).
    pub power: u8,
    /// Heating when true, cooling when false.
    pub forward: bool,
}

#[derive(Deserialize)]
pub struct PumpRequest {
    pub pump_name: String,
    pub ml_per_sec: f64,
}

#[derive(Deserialize)]
pub struct StirrerRequest {
    /// Duty cycle in percent (0-100).
    pub duty_cycle: u8,
}

#[derive(Serialize)]
pub struct LedState {
    pub led_state: bool,
}

#[derive(Serialize)]
pub struct RingLightState {
    pub color: [u8; 3],
}

#[derive(Serialize)]
pub struct PeltierState {
    pub power: u8,
    pub forward: bool,
}

#[derive(Serialize)]
pub struct PumpState {
    pub pump: String,
    pub flow_rate_ml_s: f64,
}

#[derive(Serialize)]
pub struct StirrerState {
    pub duty_cycle: u8,
}

fn require_percent(value: u8, field: &str) -> Result<(), AppError> {
    if value > 100 {
        return Err(AppError::BadRequest(format!(
            "{field} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Actuator endpoints
// ---------------------------------------------------------------------------

/// POST /api/led
async fn control_led(
    State(state): State<AppState>,
    Json(input): Json<LedRequest>,
) -> AppResult<Json<DataResponse<LedState>>> {
    state.hardware.set_led(input.state).await?;
    tracing::info!(led_state = input.state, "LED updated");
    Ok(Json(DataResponse {
        data: LedState {
            led_state: input.state,
        },
    }))
}

/// POST /api/ring-light
async fn control_ring_light(
    State(state): State<AppState>,
    Json(input): Json<RingLightRequest>,
) -> AppResult<Json<DataResponse<RingLightState>>> {
    state.hardware.set_ring_light(input.color, input.pixel).await?;
    Ok(Json(DataResponse {
        data: RingLightState { color: input.color },
    }))
}

/// POST /api/peltier
async fn control_peltier(
    State(state): State<AppState>,
    Json(input): Json<PeltierRequest>,
) -> AppResult<Json<DataResponse<PeltierState>>> {
    require_percent(input.power, "power")?;
    state.hardware.set_peltier(input.power, input.forward).await?;
    tracing::info!(power = input.power, forward = input.forward, "Peltier updated");
    Ok(Json(DataResponse {
        data: PeltierState {
            power: input.power,
            forward: input.forward,
        },
    }))
}

/// POST /api/pump
async fn control_pump(
    State(state): State<AppState>,
    Json(input): Json<PumpRequest>,
) -> AppResult<Json<DataResponse<PumpState>>> {
    if !input.ml_per_sec.is_finite() || input.ml_per_sec < 0.0 {
        return Err(AppError::BadRequest(format!(
            "ml_per_sec must be a non-negative number, got {}",
            input.ml_per_sec
        )));
    }
    state
        .hardware
        .set_pump(&input.pump_name, input.ml_per_sec)
        .await?;
    tracing::info!(pump = %input.pump_name, ml_per_sec = input.ml_per_sec, "Pump updated");
    Ok(Json(DataResponse {
        data: PumpState {
            pump: input.pump_name,
            flow_rate_ml_s: input.ml_per_sec,
        },
    }))
}

/// POST /api/stirrer
async fn control_stirrer(
    State(state): State<AppState>,
    Json(input): Json<StirrerRequest>,
) -> AppResult<Json<DataResponse<StirrerState>>> {
    require_percent(input.duty_cycle, "duty_cycle")?;
    state.hardware.set_stirrer(input.duty_cycle).await?;
    Ok(Json(DataResponse {
        data: StirrerState {
            duty_cycle: input.duty_cycle,
        },
    }))
}

// ---------------------------------------------------------------------------
// Status and sensor endpoints
// ---------------------------------------------------------------------------

/// GET /api/status
async fn hardware_status(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    let status = state.hardware.status().await?;
    Ok(Json(DataResponse { data: status }))
}

/// GET /api/sensors/all
async fn all_sensors(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SensorSnapshot>>> {
    let snapshot = state.hardware.read_all().await?;
    Ok(Json(DataResponse { data: snapshot }))
}

#[derive(Serialize)]
pub struct PhotodiodeReadings {
    pub readings: Vec<f64>,
}

/// GET /api/sensors/photodiodes
async fn photodiodes(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<PhotodiodeReadings>>> {
    let readings = state.hardware.read_photodiodes().await?;
    Ok(Json(DataResponse {
        data: PhotodiodeReadings { readings },
    }))
}

/// GET /api/sensors/temperature
async fn temperatures(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<TemperatureReadings>>> {
    let readings = state.hardware.read_temperatures().await?;
    Ok(Json(DataResponse { data: readings }))
}

#[derive(Serialize)]
pub struct CurrentReading {
    pub peltier_current: f64,
}

/// GET /api/sensors/current
async fn current(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CurrentReading>>> {
    let peltier_current = state.hardware.read_current().await?;
    Ok(Json(DataResponse {
        data: CurrentReading { peltier_current },
    }))
}

/// Hardware routes, mounted directly under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(hardware_status))
        .route("/sensors/all", get(all_sensors))
        .route("/sensors/photodiodes", get(photodiodes))
        .route("/sensors/temperature", get(temperatures))
        .route("/sensors/current", get(current))
        .route("/led", post(control_led))
        .route("/ring-light", post(control_ring_light))
        .route("/peltier", post(control_peltier))
        .route("/pump", post(control_pump))
        .route("/stirrer", post(control_stirrer))
}
