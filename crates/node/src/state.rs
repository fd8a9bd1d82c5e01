use std::sync::Arc;

use bioreactor_runtime::ExperimentManager;

use crate::config::NodeConfig;
use crate::hardware::Hardware;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Node configuration.
    pub config: Arc<NodeConfig>,
    /// Experiment lifecycle manager (registry + container runtime).
    pub manager: Arc<ExperimentManager>,
    /// Hardware backend (simulated or real rig drivers).
    pub hardware: Arc<dyn Hardware>,
}
