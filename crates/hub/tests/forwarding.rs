//! Integration tests for the hub façade.
//!
//! These run against an unreachable node address, pinning down the part
//! the hub owns outright: transport failures must surface as structured
//! 502 responses, never as hangs, panics, or bare 500s, and the hub's own
//! health must degrade rather than fail.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    body_json, build_test_app, build_unreachable_app, get, post_json, request, spawn_stub_node,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_degraded_when_node_is_unreachable() {
    let app = build_unreachable_app();
    let response = get(app, "/health").await;

    // The hub itself is up; the node being down degrades but does not
    // fail the health endpoint.
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["node_reachable"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_unreachable_app();
    let response = get(app, "/health").await;

    let request_id = response.headers().get("x-request-id");
    assert!(
        request_id.is_some(),
        "Response must contain an x-request-id header"
    );
    assert_eq!(request_id.unwrap().to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_unreachable_app();
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Forwarded experiment calls fail as structured 502s
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_against_unreachable_node_is_a_structured_502() {
    let app = build_unreachable_app();

    let response = post_json(
        app,
        "/api/experiments",
        json!({ "script_content": "print('hi')" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TRANSPORT_ERROR");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn read_throughs_against_unreachable_node_are_structured_502s() {
    let app = build_unreachable_app();
    let id = uuid::Uuid::new_v4();

    for uri in [
        format!("/api/experiments/{id}/status"),
        format!("/api/experiments/{id}/logs?tail=10"),
        format!("/api/experiments/{id}/results"),
        format!("/api/experiments/{id}/download"),
        "/api/experiments".to_string(),
    ] {
        let response = get(app.clone(), &uri).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_GATEWAY,
            "expected 502 for {uri}",
        );
        let json = body_json(response).await;
        assert_eq!(json["code"], "TRANSPORT_ERROR", "for {uri}");
    }

    let response = request(
        app.clone(),
        Method::POST,
        &format!("/api/experiments/{id}/stop"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = request(
        app.clone(),
        Method::DELETE,
        &format!("/api/experiments/{id}"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = post_json(app, "/api/maintenance/sweep", json!({ "max_age_hours": 24 })).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// ---------------------------------------------------------------------------
// Delete read-through against a stub node
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_with_garbage_node_body_is_not_reported_as_success() {
    // A node (or an intermediary) answering non-JSON must not be relayed
    // as a completed delete.
    let base = spawn_stub_node(StatusCode::OK, "<html>proxy error</html>").await;
    let app = build_test_app(&base);
    let id = uuid::Uuid::new_v4();

    let response = request(app, Method::DELETE, &format!("/api/experiments/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TRANSPORT_ERROR");
}

#[tokio::test]
async fn delete_with_empty_node_body_is_a_204() {
    let base = spawn_stub_node(StatusCode::NO_CONTENT, "").await;
    let app = build_test_app(&base);
    let id = uuid::Uuid::new_v4();

    let response = request(app, Method::DELETE, &format!("/api/experiments/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// ---------------------------------------------------------------------------
// Hardware passthrough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hardware_passthrough_fails_as_structured_502() {
    let app = build_unreachable_app();

    let response = get(app.clone(), "/api/node/status").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TRANSPORT_ERROR");

    let response = get(app.clone(), "/api/node/sensors").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = post_json(app, "/api/node/led", json!({ "state": true })).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
