//! Container runtime seam and its Docker implementation.
//!
//! The manager never talks to Docker directly; it drives this trait so
//! lifecycle tests can substitute a stub runtime. [`DockerRuntime`]
//! applies the resource policy (memory ceiling, CFS quota, network mode,
//! read-only rootfs) and the workspace bind mounts at launch.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;

use bioreactor_core::config::{NetworkMode, CPU_PERIOD_MICROS};

/// Everything the runtime needs to launch one experiment container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Container name, derived from the experiment id.
    pub name: String,
    pub image: String,
    /// Host path of the user script, bound read-only at
    /// `/workspace/script.py`.
    pub script_path: PathBuf,
    /// Host path of the output directory, bound read-write at
    /// `/workspace/output`.
    pub output_dir: PathBuf,
    pub env: Vec<String>,
    pub memory_limit_bytes: i64,
    pub cpu_quota_micros: i64,
    pub network_mode: NetworkMode,
    pub read_only_rootfs: bool,
}

/// Point-in-time container state observed by `inspect`.
#[derive(Debug, Clone, Copy)]
pub struct ContainerState {
    pub running: bool,
    /// Set once the container has exited.
    pub exit_code: Option<i64>,
}

/// Stdout and stderr captured from a container.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Container runtime error: {0}")]
    Api(String),
}

impl From<bollard::errors::Error> for RuntimeError {
    fn from(e: bollard::errors::Error) -> Self {
        Self::Api(e.to_string())
    }
}

/// The manager's view of a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container; returns the runtime handle.
    async fn launch(&self, spec: &LaunchSpec) -> Result<String, RuntimeError>;

    /// Observe whether the container is still running and, if exited,
    /// its exit code.
    async fn inspect(&self, handle: &str) -> Result<ContainerState, RuntimeError>;

    /// Capture the container's output streams, optionally only the last
    /// `tail` lines of each.
    async fn logs(&self, handle: &str, tail: Option<usize>) -> Result<CapturedLogs, RuntimeError>;

    /// Request graceful termination within the grace period, then kill.
    async fn stop(&self, handle: &str, grace: Duration) -> Result<(), RuntimeError>;

    /// Remove the container. Forced; safe to call on an exited container.
    async fn remove(&self, handle: &str) -> Result<(), RuntimeError>;
}

/// Docker answers a stop of an already-exited container with 304.
fn is_not_modified(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

/// Docker implementation used in production.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect via the platform's local defaults (unix socket or npipe).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        let binds = vec![
            format!("{}:/workspace/script.py:ro", spec.script_path.display()),
            format!("{}:/workspace/output:rw", spec.output_dir.display()),
        ];

        let host_config = HostConfig {
            memory: Some(spec.memory_limit_bytes),
            cpu_period: Some(CPU_PERIOD_MICROS),
            cpu_quota: Some(spec.cpu_quota_micros),
            readonly_rootfs: Some(spec.read_only_rootfs),
            binds: Some(binds),
            network_mode: match spec.network_mode {
                NetworkMode::Isolated => Some("none".to_string()),
                NetworkMode::Bridge => Some("bridge".to_string()),
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(vec![
                "python".to_string(),
                "/workspace/script.py".to_string(),
            ]),
            env: Some(spec.env.clone()),
            working_dir: Some("/workspace".to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let created = self.docker.create_container(Some(options), config).await?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        Ok(created.id)
    }

    async fn inspect(&self, handle: &str) -> Result<ContainerState, RuntimeError> {
        let details = self.docker.inspect_container(handle, None).await?;
        let state = details.state.unwrap_or_default();
        let running = state.running.unwrap_or(false);
        let exit_code = if running { None } else { state.exit_code };
        Ok(ContainerState { running, exit_code })
    }

    async fn logs(&self, handle: &str, tail: Option<usize>) -> Result<CapturedLogs, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            tail: tail.map_or_else(|| "all".to_string(), |n| n.to_string()),
            ..Default::default()
        };

        let mut captured = CapturedLogs::default();
        let mut stream = self.docker.logs(handle, Some(options));
        while let Some(chunk) = stream.next().await {
            match chunk? {
                LogOutput::StdOut { message } => {
                    captured.stdout.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdErr { message } => {
                    captured.stderr.push_str(&String::from_utf8_lossy(&message));
                }
                _ => {}
            }
        }
        Ok(captured)
    }

    async fn stop(&self, handle: &str, grace: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: grace.as_secs().min(i64::MAX as u64) as i64,
        };
        match self.docker.stop_container(handle, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: the container exited on its own before the stop
            // landed, which satisfies the request.
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, handle: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_container(handle, Some(options)).await?;
        Ok(())
    }
}
