//! Resource policy applied to each experiment container at launch.

use serde::{Deserialize, Serialize};

/// CFS scheduling period used to express the CPU quota, in microseconds.
pub const CPU_PERIOD_MICROS: i64 = 100_000;

/// Network attachment for an experiment container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// No network access at all.
    Isolated,
    /// Attached to the default docker bridge (needed when the script
    /// talks back to the hub API).
    Bridge,
}

/// Per-experiment resource and isolation policy.
///
/// Defaults mirror the platform's standing policy for untrusted scripts:
/// 512 MiB, one core, 24-hour ceiling, no network, read-only rootfs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Hard memory ceiling in bytes.
    pub memory_limit_bytes: i64,
    /// CPU share as a fraction of one core; converted to a CFS quota of
    /// `cpu_fraction * CPU_PERIOD_MICROS`.
    pub cpu_fraction: f64,
    /// Maximum wall-clock duration in seconds. Enforced by the manager's
    /// watchdog, not by the container runtime.
    pub max_duration_secs: u64,
    pub network_mode: NetworkMode,
    /// Mount the container root filesystem read-only; the only writable
    /// path is the `output/` bind.
    pub read_only_rootfs: bool,
    /// Image the user script runs in.
    pub image: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 512 * 1024 * 1024,
            cpu_fraction: 1.0,
            max_duration_secs: 24 * 60 * 60,
            network_mode: NetworkMode::Isolated,
            read_only_rootfs: true,
            image: "bioreactor-user-experiment:latest".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// CFS quota in microseconds derived from the CPU fraction.
    pub fn cpu_quota_micros(&self) -> i64 {
        (self.cpu_fraction * CPU_PERIOD_MICROS as f64) as i64
    }
}
