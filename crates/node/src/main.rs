use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bioreactor_node::config::{HardwareMode, NodeConfig};
use bioreactor_node::hardware::{Hardware, OfflineHardware, SimulatedHardware};
use bioreactor_node::router::build_app_router;
use bioreactor_node::state::AppState;
use bioreactor_runtime::{DockerRuntime, ExperimentManager};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bioreactor_node=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = NodeConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        hardware_mode = config.hardware_mode.as_str(),
        "Loaded node configuration"
    );

    // --- Container runtime ---
    let runtime = DockerRuntime::connect().expect("Failed to connect to Docker daemon");
    tracing::info!("Connected to Docker daemon");

    // --- Experiment manager ---
    let manager = ExperimentManager::new(&config.data_dir, &config.hub_api_url, Arc::new(runtime))
        .expect("Failed to initialize experiment manager");
    tracing::info!(data_dir = %config.data_dir.display(), "Experiment manager started");

    // --- Hardware backend ---
    let hardware: Arc<dyn Hardware> = match config.hardware_mode {
        HardwareMode::Simulation => {
            tracing::info!("Running in simulation mode, no device access");
            Arc::new(SimulatedHardware::new())
        }
        HardwareMode::Real => {
            // No driver stack is linked into this build; real mode boots
            // degraded so the experiment API stays usable.
            tracing::warn!("Real hardware mode requested but no drivers are initialized");
            Arc::new(OfflineHardware)
        }
    };

    // --- App state / router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        manager: Arc::clone(&manager),
        hardware,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting node server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop live experiment containers before exiting.
    manager.shutdown().await;

    tracing::info!("Graceful shutdown complete");
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
