//! Integration tests for the hardware control and sensor endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_default_app, get, post_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Status and sensors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hardware_status_reports_operational_simulation() {
    let (app, _dir) = build_default_app();
    let response = get(app, "/api/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "operational");
    assert_eq!(json["data"]["hardware_available"], true);
}

#[tokio::test]
async fn sensor_sweep_returns_all_reading_groups() {
    let (app, _dir) = build_default_app();
    let response = get(app, "/api/sensors/all").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert!(!data["photodiodes"].as_array().unwrap().is_empty());
    assert!(!data["vial_temperatures"].as_array().unwrap().is_empty());
    assert!(!data["io_temperatures"].as_array().unwrap().is_empty());
    assert!(data["peltier_current"].is_number());
}

#[tokio::test]
async fn individual_sensor_endpoints_answer() {
    let (app, _dir) = build_default_app();

    let response = get(app.clone(), "/api/sensors/photodiodes").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(!json["data"]["readings"].as_array().unwrap().is_empty());

    let response = get(app.clone(), "/api/sensors/temperature").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(!json["data"]["vial_temperatures"].as_array().unwrap().is_empty());

    let response = get(app, "/api/sensors/current").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["peltier_current"].is_number());
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

#[tokio::test]
async fn led_state_is_applied_and_visible_in_photodiodes() {
    let (app, _dir) = build_default_app();

    let off = body_json(get(app.clone(), "/api/sensors/photodiodes").await).await;

    let response = post_json(app.clone(), "/api/led", json!({ "state": true })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["led_state"], true);

    let on = body_json(get(app, "/api/sensors/photodiodes").await).await;
    let off_first = off["data"]["readings"][0].as_f64().unwrap();
    let on_first = on["data"]["readings"][0].as_f64().unwrap();
    assert!(on_first > off_first);
}

#[tokio::test]
async fn peltier_accepts_valid_power_and_rejects_out_of_range() {
    let (app, _dir) = build_default_app();

    let response = post_json(
        app.clone(),
        "/api/peltier",
        json!({ "power": 60, "forward": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["power"], 60);
    assert_eq!(json["data"]["forward"], true);

    let response = post_json(
        app,
        "/api/peltier",
        json!({ "power": 150, "forward": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn pump_rejects_negative_flow_rate() {
    let (app, _dir) = build_default_app();

    let response = post_json(
        app.clone(),
        "/api/pump",
        json!({ "pump_name": "media", "ml_per_sec": 0.5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["pump"], "media");

    let response = post_json(
        app,
        "/api/pump",
        json!({ "pump_name": "media", "ml_per_sec": -1.0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stirrer_and_ring_light_accept_valid_input() {
    let (app, _dir) = build_default_app();

    let response = post_json(app.clone(), "/api/stirrer", json!({ "duty_cycle": 40 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["duty_cycle"], 40);

    let response = post_json(
        app,
        "/api/ring-light",
        json!({ "color": [255, 0, 64], "pixel": 3 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["color"], json!([255, 0, 64]));
}
