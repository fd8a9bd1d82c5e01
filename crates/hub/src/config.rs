use std::path::PathBuf;

use bioreactor_transport::node::DEFAULT_NODE_API;

/// How the hub reaches the node service.
#[derive(Debug, Clone)]
pub enum NodeTarget {
    /// Direct HTTP; hub and node share a host.
    Local { base_url: String },
    /// Remote commands over SSH against the node's loopback API.
    Remote {
        host: String,
        port: u16,
        username: String,
        /// Private key file. Key-file auth is the only option here; the
        /// hub refuses password fallback.
        key_path: PathBuf,
        /// Skip known-hosts verification. Off by default.
        accept_unknown_hosts: bool,
        /// Node API base URL as seen from the node itself.
        api_base: String,
    },
}

/// Hub service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Node connection parameters.
    pub node: NodeTarget,
}

impl HubConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `8000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `NODE_API_URL`             | (unset)                 |
    /// | `NODE_HOST`                | (required unless `NODE_API_URL` set) |
    /// | `NODE_PORT`                | `22`                    |
    /// | `NODE_USERNAME`            | (required for remote)   |
    /// | `SSH_KEY_PATH`             | (required for remote)   |
    /// | `SSH_ACCEPT_UNKNOWN_HOSTS` | `false`                 |
    /// | `NODE_API_BASE`            | `http://127.0.0.1:9000` |
    ///
    /// Setting `NODE_API_URL` selects the co-located mode and the SSH
    /// variables are ignored. Otherwise `NODE_HOST`, `NODE_USERNAME`, and
    /// `SSH_KEY_PATH` must all be set; there is deliberately no password
    /// fallback for the hub.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let node = match std::env::var("NODE_API_URL") {
            Ok(base_url) => NodeTarget::Local { base_url },
            Err(_) => {
                let node_host = std::env::var("NODE_HOST")
                    .expect("NODE_HOST or NODE_API_URL must be set");

                let node_port: u16 = std::env::var("NODE_PORT")
                    .unwrap_or_else(|_| "22".into())
                    .parse()
                    .expect("NODE_PORT must be a valid u16");

                let username =
                    std::env::var("NODE_USERNAME").expect("NODE_USERNAME must be set");

                let key_path = PathBuf::from(std::env::var("SSH_KEY_PATH").expect(
                    "SSH_KEY_PATH must be set; the hub only accepts key-file authentication",
                ));

                let accept_unknown_hosts = std::env::var("SSH_ACCEPT_UNKNOWN_HOSTS")
                    .map(|v| v == "true")
                    .unwrap_or(false);

                let api_base = std::env::var("NODE_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_NODE_API.into());

                NodeTarget::Remote {
                    host: node_host,
                    port: node_port,
                    username,
                    key_path,
                    accept_unknown_hosts,
                    api_base,
                }
            }
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            node,
        }
    }
}
