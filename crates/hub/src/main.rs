use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bioreactor_hub::config::{HubConfig, NodeTarget};
use bioreactor_hub::router::build_app_router;
use bioreactor_hub::state::AppState;
use bioreactor_transport::node::NodeClient;
use bioreactor_transport::ssh::{AsyncSshClient, HostKeyPolicy, SshAuth, SshConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bioreactor_hub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = HubConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded hub configuration");

    // --- Node client ---
    let node = Arc::new(build_node_client(&config).await);

    // --- App state / router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        node: Arc::clone(&node),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting hub server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Build the node client from configuration, connecting the SSH transport
/// up front in remote mode so misconfiguration fails at startup.
async fn build_node_client(config: &HubConfig) -> NodeClient {
    match &config.node {
        NodeTarget::Local { base_url } => {
            tracing::info!(base_url = %base_url, "Using co-located node over HTTP");
            NodeClient::local(base_url.clone())
        }
        NodeTarget::Remote {
            host,
            port,
            username,
            key_path,
            accept_unknown_hosts,
            api_base,
        } => {
            let host_key_policy = if *accept_unknown_hosts {
                tracing::warn!("Host key verification disabled (SSH_ACCEPT_UNKNOWN_HOSTS=true)");
                HostKeyPolicy::AcceptAny
            } else {
                HostKeyPolicy::default()
            };

            let ssh = AsyncSshClient::new(SshConfig {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                auth: SshAuth::KeyFile(key_path.clone()),
                host_key_policy,
            });
            ssh.connect()
                .await
                .expect("Failed to connect to node over SSH");
            tracing::info!(host = %host, port = %port, "Connected to node over SSH");

            NodeClient::remote_with_api_base(ssh, api_base.clone())
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
