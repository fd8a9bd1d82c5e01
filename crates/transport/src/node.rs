//! Hardware control forwarding against the node's local API.
//!
//! The node exposes its hardware and experiment surface as a local HTTP
//! API. [`NodeClient`] reaches it one of two ways: a `curl` probe executed
//! over the SSH transport (the hub's usual path) or a direct HTTP call
//! when co-located with the node process. Every call collapses transport
//! failure, non-JSON bodies, and application-level error payloads into the
//! single tagged [`NodeResponse`], so callers branch on one shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use bioreactor_core::error::CoreError;
use bioreactor_core::types::ExperimentId;

use crate::ssh::AsyncSshClient;

/// Node API port as seen from the node itself (the `curl` probe runs
/// there, not on the hub).
pub const DEFAULT_NODE_API: &str = "http://127.0.0.1:9000";

/// Normalized outcome of a forwarded call.
///
/// An application error embedded in a well-formed payload is as
/// actionable as a transport failure; callers must not treat `Ok` as the
/// only branch worth handling.
#[derive(Debug, Clone)]
pub enum NodeResponse {
    /// Well-formed payload with no embedded error.
    Ok(Value),
    /// A response with no body at all, e.g. a 204 from a delete.
    Empty,
    /// The command or request never produced a response body.
    TransportError(String),
    /// A response arrived but was not valid JSON.
    DecodeError(String),
    /// Well-formed JSON that encodes an application-level error.
    ApplicationError(Value),
}

impl NodeResponse {
    /// Collapse into a [`CoreError`] for callers that only need the
    /// success payload.
    pub fn into_result(self) -> Result<Value, CoreError> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Empty => Err(CoreError::Transport("empty node response".into())),
            Self::TransportError(reason) => Err(CoreError::Transport(reason)),
            Self::DecodeError(reason) => {
                Err(CoreError::Transport(format!("invalid node response: {reason}")))
            }
            Self::ApplicationError(payload) => {
                let detail = payload
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("node reported an error");
                Err(CoreError::Runtime(detail.to_string()))
            }
        }
    }
}

/// Classify a raw response body once, at the transport boundary.
fn normalize_payload(body: &str) -> NodeResponse {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return NodeResponse::Empty;
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => return NodeResponse::DecodeError(e.to_string()),
    };

    let has_error_key = value.get("error").is_some();
    let error_status = value
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "error");

    if has_error_key || error_status {
        NodeResponse::ApplicationError(value)
    } else {
        NodeResponse::Ok(value)
    }
}

/// Quote a string for safe inclusion in a single-quoted shell argument.
fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[derive(Debug, Clone, Copy)]
enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// How the node's API is reached.
pub enum NodeLink {
    /// `curl` over the SSH transport, for a hub on a different host.
    Remote(AsyncSshClient),
    /// Direct HTTP, for a façade co-located with the node process.
    Local {
        http: reqwest::Client,
        base_url: String,
    },
}

/// Client for the node's hardware and experiment API.
pub struct NodeClient {
    link: NodeLink,
    /// Base URL the remote `curl` probe targets, as seen from the node.
    remote_api_base: String,
}

impl NodeClient {
    pub fn remote(ssh: AsyncSshClient) -> Self {
        Self {
            link: NodeLink::Remote(ssh),
            remote_api_base: DEFAULT_NODE_API.to_string(),
        }
    }

    pub fn remote_with_api_base(ssh: AsyncSshClient, api_base: impl Into<String>) -> Self {
        Self {
            link: NodeLink::Remote(ssh),
            remote_api_base: api_base.into(),
        }
    }

    pub fn local(base_url: impl Into<String>) -> Self {
        Self {
            link: NodeLink::Local {
                http: reqwest::Client::new(),
                base_url: base_url.into(),
            },
            remote_api_base: DEFAULT_NODE_API.to_string(),
        }
    }

    // ---- hardware surface ----

    /// Overall hardware status.
    pub async fn get_status(&self) -> NodeResponse {
        self.request(HttpMethod::Get, "/api/status", None).await
    }

    /// All sensor readings in one payload.
    pub async fn get_sensors(&self) -> NodeResponse {
        self.request(HttpMethod::Get, "/api/sensors/all", None).await
    }

    /// Node service health probe.
    pub async fn health(&self) -> NodeResponse {
        self.request(HttpMethod::Get, "/health", None).await
    }

    /// Send an actuation command to a hardware endpoint, e.g.
    /// `control("/api/led", json!({"state": true}))`.
    pub async fn control(&self, endpoint: &str, payload: &Value) -> NodeResponse {
        self.request(HttpMethod::Post, endpoint, Some(payload)).await
    }

    // ---- experiment surface (hub read-throughs) ----

    pub async fn submit_experiment(&self, script_content: &str, config: Option<Value>) -> NodeResponse {
        let mut body = serde_json::json!({ "script_content": script_content });
        if let Some(config) = config {
            body["config"] = config;
        }
        self.request(HttpMethod::Post, "/api/experiments", Some(&body))
            .await
    }

    pub async fn list_experiments(&self) -> NodeResponse {
        self.request(HttpMethod::Get, "/api/experiments", None).await
    }

    pub async fn experiment_status(&self, id: ExperimentId) -> NodeResponse {
        self.request(HttpMethod::Get, &format!("/api/experiments/{id}/status"), None)
            .await
    }

    pub async fn experiment_logs(&self, id: ExperimentId, tail: Option<usize>) -> NodeResponse {
        let path = match tail {
            Some(tail) => format!("/api/experiments/{id}/logs?tail={tail}"),
            None => format!("/api/experiments/{id}/logs"),
        };
        self.request(HttpMethod::Get, &path, None).await
    }

    pub async fn experiment_results(&self, id: ExperimentId) -> NodeResponse {
        self.request(HttpMethod::Get, &format!("/api/experiments/{id}/results"), None)
            .await
    }

    pub async fn stop_experiment(&self, id: ExperimentId) -> NodeResponse {
        self.request(HttpMethod::Post, &format!("/api/experiments/{id}/stop"), None)
            .await
    }

    pub async fn delete_experiment(&self, id: ExperimentId) -> NodeResponse {
        self.request(HttpMethod::Delete, &format!("/api/experiments/{id}"), None)
            .await
    }

    pub async fn sweep(&self, max_age_hours: u64) -> NodeResponse {
        let body = serde_json::json!({ "max_age_hours": max_age_hours });
        self.request(HttpMethod::Post, "/api/maintenance/sweep", Some(&body))
            .await
    }

    /// Fetch the packaged results archive as raw bytes.
    ///
    /// Binary data cannot ride a text-oriented remote shell, so the remote
    /// path base64-encodes on the node and decodes here.
    pub async fn fetch_archive(&self, id: ExperimentId) -> Result<Vec<u8>, CoreError> {
        let path = format!("/api/experiments/{id}/download");
        match &self.link {
            NodeLink::Local { http, base_url } => {
                let url = format!("{base_url}{path}");
                let response = http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| CoreError::Transport(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(CoreError::Transport(format!(
                        "archive download returned {}",
                        response.status()
                    )));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| CoreError::Transport(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            NodeLink::Remote(ssh) => {
                let command =
                    format!("curl -sf {}{path} | base64", self.remote_api_base);
                let output = ssh.execute(command).await;
                decode_archive_output(output)
            }
        }
    }

    // ---- plumbing ----

    async fn request(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> NodeResponse {
        match &self.link {
            NodeLink::Remote(ssh) => {
                let command = build_curl_command(&self.remote_api_base, method, path, body);
                let output = ssh.execute(command).await;
                if !output.success {
                    let reason = output
                        .error
                        .unwrap_or_else(|| format!("curl failed: {}", output.stderr));
                    return NodeResponse::TransportError(reason);
                }
                normalize_payload(&output.stdout)
            }
            NodeLink::Local { http, base_url } => {
                let url = format!("{base_url}{path}");
                let request = match method {
                    HttpMethod::Get => http.get(&url),
                    HttpMethod::Post => match body {
                        Some(body) => http.post(&url).json(body),
                        None => http.post(&url),
                    },
                    HttpMethod::Delete => http.delete(&url),
                };
                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => return NodeResponse::TransportError(e.to_string()),
                };
                let text = match response.text().await {
                    Ok(text) => text,
                    Err(e) => return NodeResponse::TransportError(e.to_string()),
                };
                normalize_payload(&text)
            }
        }
    }
}

/// Decode the base64 payload produced by the remote archive probe.
///
/// The shell reports the pipeline's exit status, which is base64's, so a
/// failed `curl` still arrives as `success = true` with nothing on
/// stdout. An archive is never zero bytes, so empty output means the
/// download itself failed.
fn decode_archive_output(output: crate::ssh::CommandOutput) -> Result<Vec<u8>, CoreError> {
    if !output.success {
        let reason = output
            .error
            .unwrap_or_else(|| format!("curl failed: {}", output.stderr));
        return Err(CoreError::Transport(reason));
    }
    let compact: String = output.stdout.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(CoreError::Transport(
            "archive download produced no data".into(),
        ));
    }
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| CoreError::Transport(format!("archive decode failed: {e}")))
}

/// Render the `curl` invocation the remote probe runs on the node.
fn build_curl_command(
    api_base: &str,
    method: HttpMethod,
    path: &str,
    body: Option<&Value>,
) -> String {
    let url = format!("{api_base}{path}");
    match (method, body) {
        (HttpMethod::Get, _) => format!("curl -s {url}"),
        (HttpMethod::Delete, _) => format!("curl -s -X DELETE {url}"),
        (HttpMethod::Post, None) => format!("curl -s -X POST {url}"),
        (HttpMethod::Post, Some(body)) => format!(
            "curl -s -X POST {url} -H \"Content-Type: application/json\" -d {}",
            shell_quote(&body.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn well_formed_payload_normalizes_to_ok() {
        let response = normalize_payload(r#"{"status":"success","readings":[1,2,3]}"#);
        assert_matches!(response, NodeResponse::Ok(value) => {
            assert_eq!(value["readings"][0], 1);
        });
    }

    #[test]
    fn payload_with_error_key_is_an_application_error() {
        let response = normalize_payload(r#"{"error":"pump jammed"}"#);
        assert_matches!(response, NodeResponse::ApplicationError(_));

        let response = normalize_payload(r#"{"status":"error","detail":"overheating"}"#);
        assert_matches!(response, NodeResponse::ApplicationError(_));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        assert_matches!(normalize_payload("<html>bad gateway</html>"), NodeResponse::DecodeError(_));
    }

    #[test]
    fn bodyless_response_is_empty_not_a_decode_error() {
        assert_matches!(normalize_payload(""), NodeResponse::Empty);
        assert_matches!(normalize_payload("   \n"), NodeResponse::Empty);
    }

    #[test]
    fn application_error_surfaces_detail_through_into_result() {
        let response = normalize_payload(r#"{"error":"pump jammed"}"#);
        let err = response.into_result().unwrap_err();
        assert!(err.to_string().contains("pump jammed"));
    }

    #[test]
    fn shell_quote_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn curl_command_shapes() {
        let get = build_curl_command(DEFAULT_NODE_API, HttpMethod::Get, "/api/status", None);
        assert_eq!(get, "curl -s http://127.0.0.1:9000/api/status");

        let body = json!({"state": true});
        let post =
            build_curl_command(DEFAULT_NODE_API, HttpMethod::Post, "/api/led", Some(&body));
        assert!(post.starts_with("curl -s -X POST http://127.0.0.1:9000/api/led"));
        assert!(post.contains(r#"-d '{"state":true}'"#));

        let delete = build_curl_command(
            DEFAULT_NODE_API,
            HttpMethod::Delete,
            "/api/experiments/abc",
            None,
        );
        assert_eq!(delete, "curl -s -X DELETE http://127.0.0.1:9000/api/experiments/abc");
    }

    #[test]
    fn archive_download_empty_output_is_a_transport_error() {
        use crate::ssh::CommandOutput;

        // `curl -sf ... | base64` reports base64's exit status, so a 404
        // or refused connection arrives as success with empty stdout.
        let output = CommandOutput::from_exec(String::new(), String::new(), 0);
        assert_matches!(
            decode_archive_output(output).unwrap_err(),
            CoreError::Transport(_)
        );
    }

    #[test]
    fn archive_download_decodes_line_wrapped_base64() {
        use crate::ssh::CommandOutput;

        let encoded = BASE64.encode(b"PK\x03\x04payload");
        let wrapped = format!("{}\n{}\n", &encoded[..4], &encoded[4..]);
        let output = CommandOutput::from_exec(wrapped, String::new(), 0);
        assert_eq!(decode_archive_output(output).unwrap(), b"PK\x03\x04payload");
    }

    #[tokio::test]
    async fn local_link_to_unreachable_host_is_a_transport_error() {
        // Port 1 never serves HTTP.
        let client = NodeClient::local("http://127.0.0.1:1");
        let response = client.get_status().await;
        assert_matches!(response, NodeResponse::TransportError(_));

        let err = client
            .fetch_archive(uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Transport(_));
    }
}
