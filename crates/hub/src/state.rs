use std::sync::Arc;

use bioreactor_transport::node::NodeClient;

use crate::config::HubConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Hub configuration.
    pub config: Arc<HubConfig>,
    /// Client for the node's hardware and experiment API.
    pub node: Arc<NodeClient>,
}
