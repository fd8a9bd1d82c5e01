use std::path::PathBuf;

/// Hardware backend selection.
///
/// Parsed from `HARDWARE_MODE`; anything other than `real` falls back to
/// simulation, which needs no device access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    Simulation,
    Real,
}

impl HardwareMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareMode::Simulation => "simulation",
            HardwareMode::Real => "real",
        }
    }
}

/// Node service configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `9000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for experiment working directories.
    pub data_dir: PathBuf,
    /// Hardware backend (default: simulation).
    pub hardware_mode: HardwareMode,
    /// Hub API URL injected into experiment containers so user scripts can
    /// reach the hardware endpoints.
    pub hub_api_url: String,
}

impl NodeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                           |
    /// |------------------------|-----------------------------------|
    /// | `HOST`                 | `0.0.0.0`                         |
    /// | `PORT`                 | `9000`                            |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`           |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                              |
    /// | `DATA_DIR`             | `./data`                          |
    /// | `HARDWARE_MODE`        | `simulation`                      |
    /// | `HUB_API_URL`          | `http://host.docker.internal:8000`|
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "9000".into())
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

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()));

        let hardware_mode = match std::env::var("HARDWARE_MODE").as_deref() {
            Ok("real") => HardwareMode::Real,
            _ => HardwareMode::Simulation,
        };

        let hub_api_url = std::env::var("HUB_API_URL")
            .unwrap_or_else(|_| "http://host.docker.internal:8000".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            hardware_mode,
            hub_api_url,
        }
    }
}
