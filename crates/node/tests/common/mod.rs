use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use bioreactor_node::config::{HardwareMode, NodeConfig};
use bioreactor_node::hardware::SimulatedHardware;
use bioreactor_node::router::build_app_router;
use bioreactor_node::state::AppState;
use bioreactor_runtime::runtime::{
    CapturedLogs, ContainerRuntime, ContainerState, LaunchSpec, RuntimeError,
};
use bioreactor_runtime::ExperimentManager;

/// Stub container runtime whose containers exit immediately with a fixed
/// code, or whose launches always fail.
pub struct ScriptedRuntime {
    exit_code: i64,
    launch_error: Option<String>,
    stdout: String,
}

impl ScriptedRuntime {
    pub fn instant_exit(exit_code: i64) -> Self {
        Self {
            exit_code,
            launch_error: None,
            stdout: String::new(),
        }
    }

    pub fn instant_exit_with_stdout(exit_code: i64, stdout: &str) -> Self {
        Self {
            exit_code,
            launch_error: None,
            stdout: stdout.to_string(),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            exit_code: 0,
            launch_error: Some(reason.to_string()),
            stdout: String::new(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        if let Some(reason) = &self.launch_error {
            return Err(RuntimeError::Api(reason.clone()));
        }
        Ok(format!("ctr-{}", spec.name))
    }

    async fn inspect(&self, _handle: &str) -> Result<ContainerState, RuntimeError> {
        Ok(ContainerState {
            running: false,
            exit_code: Some(self.exit_code),
        })
    }

    async fn logs(&self, _handle: &str, _tail: Option<usize>) -> Result<CapturedLogs, RuntimeError> {
        Ok(CapturedLogs {
            stdout: self.stdout.clone(),
            stderr: String::new(),
        })
    }

    async fn stop(&self, _handle: &str, _grace: Duration) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn remove(&self, _handle: &str) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Build a test `NodeConfig` with safe defaults.
pub fn test_config(data_dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: data_dir.to_path_buf(),
        hardware_mode: HardwareMode::Simulation,
        hub_api_url: "http://localhost:8000".to_string(),
    }
}

/// Build the full application router with all middleware layers over the
/// given container runtime stub and simulated hardware.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses. The returned
/// `TempDir` holds the experiment working directories and must stay alive
/// for the duration of the test.
pub fn build_test_app(runtime: Arc<dyn ContainerRuntime>) -> (Router, tempfile::TempDir) {
    let data_dir = tempfile::tempdir().unwrap();
    let config = test_config(data_dir.path());

    let manager = ExperimentManager::new(data_dir.path(), &config.hub_api_url, runtime).unwrap();
    let state = AppState {
        config: Arc::new(config.clone()),
        manager,
        hardware: Arc::new(SimulatedHardware::new()),
    };

    (build_app_router(state, &config), data_dir)
}

/// Default test app: containers exit immediately with code 0.
pub fn build_default_app() -> (Router, tempfile::TempDir) {
    build_test_app(Arc::new(ScriptedRuntime::instant_exit(0)))
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

/// Collect the raw response body.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Submit a script and return the assigned experiment id.
pub async fn submit_script(app: &Router, script: &str) -> String {
    let response = post_json(
        app.clone(),
        "/api/experiments",
        serde_json::json!({ "script_content": script }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

/// Poll the status endpoint until the experiment reaches a terminal
/// status, and return the final summary.
pub async fn wait_for_terminal(app: &Router, id: &str) -> Value {
    for _ in 0..100 {
        let response = get(app.clone(), &format!("/api/experiments/{id}/status")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if matches!(status.as_str(), "completed" | "failed" | "stopped") {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("experiment {id} did not reach a terminal status in time");
}
