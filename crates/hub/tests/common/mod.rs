use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use bioreactor_hub::config::{HubConfig, NodeTarget};
use bioreactor_hub::router::build_app_router;
use bioreactor_hub::state::AppState;
use bioreactor_transport::node::NodeClient;

/// Build a test `HubConfig` pointing at the given node base URL.
pub fn test_config(node_base_url: &str) -> HubConfig {
    HubConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        node: NodeTarget::Local {
            base_url: node_base_url.to_string(),
        },
    }
}

/// Build the full application router with all middleware layers, using a
/// co-located node client against `node_base_url`.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
pub fn build_test_app(node_base_url: &str) -> Router {
    let config = test_config(node_base_url);
    let state = AppState {
        config: Arc::new(config.clone()),
        node: Arc::new(NodeClient::local(node_base_url)),
    };
    build_app_router(state, &config)
}

/// Test app whose node is unreachable: every forwarded call fails at the
/// transport. Port 1 never serves HTTP.
pub fn build_unreachable_app() -> Router {
    build_test_app("http://127.0.0.1:1")
}

/// Spawn a stub node on an ephemeral port that answers every request
/// with the given status and body. Returns its base URL.
pub async fn spawn_stub_node(status: StatusCode, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stub = Router::new().fallback(move || async move { (status, body) });
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn request(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    request(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, json: Value) -> Response<Body> {
    request(app, Method::POST, uri, Some(json)).await
}

/// Collect the response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
