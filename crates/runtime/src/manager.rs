//! Experiment lifecycle manager.
//!
//! [`ExperimentManager`] is the single owner of truth for every in-flight
//! and terminal execution within this process. It allocates the working
//! directory, launches the container through the [`ContainerRuntime`]
//! seam, lazily reconciles runtime state on status queries, and tears the
//! record and its directory down together.
//!
//! Status transitions for one experiment are serialized through the
//! registry lock: a reconciliation never races a concurrent `stop` into
//! double-stamping `end_time`, and once a terminal status is visible the
//! terminal fields are already set.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use bioreactor_core::config::ExperimentConfig;
use bioreactor_core::error::CoreError;
use bioreactor_core::types::{
    ExperimentId, ExperimentResults, ExperimentStatus, ExperimentSummary, Timestamp,
};

use crate::archive;
use crate::runtime::{CapturedLogs, ContainerRuntime, LaunchSpec};

/// Script filename inside the working directory; bound read-only into the
/// container at `/workspace/script.py`.
const SCRIPT_NAME: &str = "script.py";

/// Grace period for an operator-requested stop.
pub const STOP_GRACE: Duration = Duration::from_secs(30);

/// Shorter grace period used when tearing an experiment down.
const CLEANUP_GRACE: Duration = Duration::from_secs(10);

/// Placeholder returned when logs are legitimately unavailable (the
/// container was never launched).
const NO_LOGS_PLACEHOLDER: &str = "No container logs available";

/// One experiment record. Owned exclusively by the registry.
struct Experiment {
    id: ExperimentId,
    status: ExperimentStatus,
    config: ExperimentConfig,
    script_source: String,
    workdir: PathBuf,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    exit_code: Option<i64>,
    error_message: Option<String>,
    /// Container id; present only while starting/running.
    handle: Option<String>,
}

impl Experiment {
    fn summary(&self) -> ExperimentSummary {
        ExperimentSummary {
            id: self.id,
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            exit_code: self.exit_code,
            error_message: self.error_message.clone(),
        }
    }
}

/// Registry and orchestrator for experiment containers.
///
/// Created once at service start via [`ExperimentManager::new`]; the
/// returned `Arc` is cloned into request handlers. Call
/// [`ExperimentManager::shutdown`] before process exit to stop live
/// containers.
pub struct ExperimentManager {
    data_dir: PathBuf,
    /// Hub API URL injected into experiment containers so scripts can
    /// drive the hardware.
    hub_api_url: String,
    runtime: Arc<dyn ContainerRuntime>,
    experiments: RwLock<HashMap<ExperimentId, Experiment>>,
}

impl ExperimentManager {
    /// Create the manager, materializing `<data_dir>/experiments`.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        hub_api_url: impl Into<String>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Arc<Self>, CoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join("experiments"))
            .map_err(|e| CoreError::Internal(format!("creating data directory: {e}")))?;
        Ok(Arc::new(Self {
            data_dir,
            hub_api_url: hub_api_url.into(),
            runtime,
            experiments: RwLock::new(HashMap::new()),
        }))
    }

    /// Allocate an id, working directory (with `output/`), and a record
    /// in `created` state. Does not touch the container runtime.
    pub async fn create(
        &self,
        script_source: &str,
        config: ExperimentConfig,
    ) -> Result<ExperimentId, CoreError> {
        if script_source.trim().is_empty() {
            return Err(CoreError::Validation("script source is empty".into()));
        }
        if config.cpu_fraction <= 0.0 {
            return Err(CoreError::Validation(
                "cpu_fraction must be positive".into(),
            ));
        }

        let id = uuid::Uuid::new_v4();
        let workdir = self.data_dir.join("experiments").join(id.to_string());
        tokio::fs::create_dir_all(workdir.join("output"))
            .await
            .map_err(|e| CoreError::Internal(format!("creating working directory: {e}")))?;

        let experiment = Experiment {
            id,
            status: ExperimentStatus::Created,
            config,
            script_source: script_source.to_string(),
            workdir,
            start_time: None,
            end_time: None,
            exit_code: None,
            error_message: None,
            handle: None,
        };
        self.experiments.write().await.insert(id, experiment);

        tracing::info!(id = %id, "Created experiment");
        Ok(id)
    }

    /// Write the script and launch the container.
    ///
    /// Rejects any experiment that is no longer in `created` state, so a
    /// second concurrent `start` can never produce a second handle. A
    /// launch failure records `failed` with an `error_message` before
    /// returning -- the record is never left in `starting`.
    pub async fn start(self: &Arc<Self>, id: ExperimentId) -> Result<(), CoreError> {
        let (script, config, workdir) = {
            let mut experiments = self.experiments.write().await;
            let exp = experiments
                .get_mut(&id)
                .ok_or(CoreError::not_found("Experiment", id))?;
            if exp.status != ExperimentStatus::Created {
                return Err(CoreError::Conflict(format!(
                    "experiment {id} already started (status: {})",
                    exp.status
                )));
            }
            exp.status = ExperimentStatus::Starting;
            (exp.script_source.clone(), exp.config.clone(), exp.workdir.clone())
        };

        let script_path = workdir.join(SCRIPT_NAME);
        if let Err(e) = tokio::fs::write(&script_path, &script).await {
            let reason = format!("writing script: {e}");
            self.mark_launch_failed(id, &reason).await;
            return Err(CoreError::Runtime(reason));
        }

        let spec = LaunchSpec {
            name: format!("experiment-{id}"),
            image: config.image.clone(),
            script_path,
            output_dir: workdir.join("output"),
            env: vec![
                format!("EXPERIMENT_ID={id}"),
                format!("BIOREACTOR_HUB_API_URL={}", self.hub_api_url),
            ],
            memory_limit_bytes: config.memory_limit_bytes,
            cpu_quota_micros: config.cpu_quota_micros(),
            network_mode: config.network_mode,
            read_only_rootfs: config.read_only_rootfs,
        };

        match self.runtime.launch(&spec).await {
            Ok(handle) => {
                {
                    let mut experiments = self.experiments.write().await;
                    match experiments.get_mut(&id) {
                        Some(exp) => {
                            exp.handle = Some(handle.clone());
                            exp.status = ExperimentStatus::Running;
                            exp.start_time = Some(Utc::now());
                        }
                        None => {
                            // Cleaned up while launching; reap the orphan.
                            let _ = self.runtime.stop(&handle, CLEANUP_GRACE).await;
                            let _ = self.runtime.remove(&handle).await;
                            return Err(CoreError::not_found("Experiment", id));
                        }
                    }
                }
                self.arm_watchdog(id, Duration::from_secs(config.max_duration_secs));
                tracing::info!(id = %id, "Experiment container started");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(id = %id, error = %reason, "Container launch failed");
                self.mark_launch_failed(id, &reason).await;
                Err(CoreError::Runtime(reason))
            }
        }
    }

    /// Current record state, reconciling against the runtime first when a
    /// live handle exists.
    ///
    /// This lazy reconciliation is the only place terminal fields are
    /// derived from the runtime rather than set directly by
    /// `start`/`stop`. It is a no-op once the record is terminal.
    pub async fn get_status(&self, id: ExperimentId) -> Result<ExperimentSummary, CoreError> {
        let handle = {
            let experiments = self.experiments.read().await;
            let exp = experiments
                .get(&id)
                .ok_or(CoreError::not_found("Experiment", id))?;
            if exp.status == ExperimentStatus::Running {
                exp.handle.clone()
            } else {
                None
            }
        };

        if let Some(handle) = handle {
            self.reconcile(id, &handle).await;
        }

        let experiments = self.experiments.read().await;
        experiments
            .get(&id)
            .map(Experiment::summary)
            .ok_or(CoreError::not_found("Experiment", id))
    }

    /// Captured output of the experiment.
    ///
    /// Prefers the live runtime stream; falls back to the capture files
    /// written at completion; yields an explanatory placeholder when the
    /// container was never launched.
    pub async fn logs(&self, id: ExperimentId, tail: Option<usize>) -> Result<String, CoreError> {
        let (handle, workdir) = {
            let experiments = self.experiments.read().await;
            let exp = experiments
                .get(&id)
                .ok_or(CoreError::not_found("Experiment", id))?;
            (exp.handle.clone(), exp.workdir.clone())
        };

        if let Some(handle) = handle {
            return match self.runtime.logs(&handle, tail).await {
                Ok(logs) => Ok(combine_logs(&logs)),
                // Logs are diagnostics; a retrieval failure is reported
                // in-band rather than failing the whole call.
                Err(e) => Ok(format!("Error retrieving logs: {e}")),
            };
        }

        let stdout = tokio::fs::read_to_string(workdir.join("stdout.txt")).await.ok();
        let stderr = tokio::fs::read_to_string(workdir.join("stderr.txt")).await.ok();
        if stdout.is_none() && stderr.is_none() {
            return Ok(NO_LOGS_PLACEHOLDER.to_string());
        }
        let combined = combine_logs(&CapturedLogs {
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
        });
        Ok(match tail {
            Some(tail) => tail_lines(&combined, tail),
            None => combined,
        })
    }

    /// Relative paths of everything the script wrote under `output/`.
    pub async fn results(&self, id: ExperimentId) -> Result<ExperimentResults, CoreError> {
        let (workdir, exit_code) = {
            let experiments = self.experiments.read().await;
            let exp = experiments
                .get(&id)
                .ok_or(CoreError::not_found("Experiment", id))?;
            (exp.workdir.clone(), exp.exit_code)
        };
        let output_files = archive::list_output_files(&workdir)?;
        Ok(ExperimentResults {
            id,
            output_files,
            exit_code,
        })
    }

    /// Package the experiment's results into a zip and return its path.
    pub async fn package(&self, id: ExperimentId) -> Result<PathBuf, CoreError> {
        let workdir = {
            let experiments = self.experiments.read().await;
            experiments
                .get(&id)
                .map(|exp| exp.workdir.clone())
                .ok_or(CoreError::not_found("Experiment", id))?
        };
        tokio::task::spawn_blocking(move || archive::package(&workdir))
            .await
            .map_err(|e| CoreError::Internal(format!("packaging task failed: {e}")))?
    }

    /// Request graceful termination of the experiment's container.
    ///
    /// Idempotent: an id with no live handle is a no-op success, and
    /// neither `start_time` nor `end_time` is touched in that case.
    pub async fn stop(&self, id: ExperimentId, grace: Duration) -> Result<(), CoreError> {
        let handle = {
            let experiments = self.experiments.read().await;
            let exp = experiments
                .get(&id)
                .ok_or(CoreError::not_found("Experiment", id))?;
            exp.handle.clone()
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        // The container may have exited since the handle was recorded;
        // reconcile first so a finished run keeps its real outcome
        // instead of being restamped as stopped.
        self.reconcile(id, &handle).await;
        {
            let experiments = self.experiments.read().await;
            if let Some(exp) = experiments.get(&id) {
                if exp.status.is_terminal() {
                    return Ok(());
                }
            }
        }

        self.runtime
            .stop(&handle, grace)
            .await
            .map_err(|e| CoreError::Runtime(e.to_string()))?;
        let logs = self.runtime.logs(&handle, None).await.unwrap_or_default();

        {
            let mut experiments = self.experiments.write().await;
            if let Some(exp) = experiments.get_mut(&id) {
                if !exp.status.is_terminal() {
                    write_capture_files(&exp.workdir, &logs, None).await;
                    exp.status = ExperimentStatus::Stopped;
                    exp.end_time = Some(Utc::now());
                    exp.handle = None;
                }
            }
        }
        let _ = self.runtime.remove(&handle).await;

        tracing::info!(id = %id, "Experiment stopped");
        Ok(())
    }

    /// Snapshot of every known experiment.
    pub async fn list(&self) -> Vec<ExperimentSummary> {
        let experiments = self.experiments.read().await;
        let mut summaries: Vec<_> = experiments.values().map(Experiment::summary).collect();
        summaries.sort_by_key(|s| s.start_time);
        summaries
    }

    /// Remove the record and its working directory together, stopping the
    /// container first if one is live.
    pub async fn cleanup(&self, id: ExperimentId) -> Result<(), CoreError> {
        let exp = {
            let mut experiments = self.experiments.write().await;
            experiments
                .remove(&id)
                .ok_or(CoreError::not_found("Experiment", id))?
        };

        if let Some(handle) = &exp.handle {
            let _ = self.runtime.stop(handle, CLEANUP_GRACE).await;
            let _ = self.runtime.remove(handle).await;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&exp.workdir).await {
            tracing::error!(id = %id, error = %e, "Failed to remove working directory");
        }

        tracing::info!(id = %id, "Cleaned up experiment");
        Ok(())
    }

    /// Remove every record whose `end_time` predates `now - max_age`.
    /// Returns the number removed.
    pub async fn sweep(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let expired: Vec<ExperimentId> = {
            let experiments = self.experiments.read().await;
            experiments
                .values()
                .filter(|exp| exp.end_time.is_some_and(|t| t < cutoff))
                .map(|exp| exp.id)
                .collect()
        };

        let mut removed = 0;
        for id in expired {
            if self.cleanup(id).await.is_ok() {
                removed += 1;
            }
        }
        tracing::info!(removed, "Swept old experiments");
        removed
    }

    /// Stop every live container. Called once at service shutdown.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down experiment manager");
        let live: Vec<ExperimentId> = {
            let experiments = self.experiments.read().await;
            experiments
                .values()
                .filter(|exp| exp.handle.is_some())
                .map(|exp| exp.id)
                .collect()
        };
        for id in live {
            if let Err(e) = self.stop(id, Duration::from_secs(5)).await {
                tracing::error!(id = %id, error = %e, "Failed to stop experiment at shutdown");
            }
        }
    }

    // ---- private helpers ----

    /// Observe the runtime and, if the container has exited, capture its
    /// streams and flip the record to its terminal state.
    ///
    /// Idempotent: re-checks status and handle under the write lock, so a
    /// concurrent `stop` or duplicate reconciliation leaves the terminal
    /// fields stamped exactly once.
    async fn reconcile(&self, id: ExperimentId, handle: &str) {
        let state = match self.runtime.inspect(handle).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to inspect container");
                return;
            }
        };
        if state.running {
            return;
        }
        let logs = self.runtime.logs(handle, None).await.unwrap_or_default();

        {
            let mut experiments = self.experiments.write().await;
            let Some(exp) = experiments.get_mut(&id) else {
                return;
            };
            if exp.status != ExperimentStatus::Running || exp.handle.as_deref() != Some(handle) {
                return;
            }

            let exit_code = state.exit_code.unwrap_or(-1);
            write_capture_files(&exp.workdir, &logs, Some(exit_code)).await;
            exp.exit_code = Some(exit_code);
            exp.status = if exit_code == 0 {
                ExperimentStatus::Completed
            } else {
                ExperimentStatus::Failed
            };
            exp.end_time = Some(Utc::now());
            exp.handle = None;

            tracing::info!(id = %id, exit_code, status = %exp.status, "Experiment finished");
        }

        let _ = self.runtime.remove(handle).await;
    }

    /// Record a launch failure: `failed` + `error_message` + `end_time`,
    /// no exit code.
    async fn mark_launch_failed(&self, id: ExperimentId, reason: &str) {
        let mut experiments = self.experiments.write().await;
        if let Some(exp) = experiments.get_mut(&id) {
            if !exp.status.is_terminal() {
                exp.status = ExperimentStatus::Failed;
                exp.error_message = Some(reason.to_string());
                exp.end_time = Some(Utc::now());
            }
        }
    }

    /// Stop the experiment once its configured wall-clock ceiling passes.
    fn arm_watchdog(self: &Arc<Self>, id: ExperimentId, deadline: Duration) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let still_running =
                matches!(manager.get_status(id).await, Ok(s) if !s.status.is_terminal());
            if still_running {
                tracing::warn!(id = %id, "Experiment exceeded max duration, stopping");
                if let Err(e) = manager.stop(id, STOP_GRACE).await {
                    tracing::error!(id = %id, error = %e, "Watchdog stop failed");
                }
            }
        });
    }
}

/// Write `stdout.txt` / `stderr.txt` (and `exitcode.txt` when an exit
/// code is known) into the working directory. Best-effort: a failed write
/// is logged, not fatal to the state transition.
async fn write_capture_files(workdir: &std::path::Path, logs: &CapturedLogs, exit_code: Option<i64>) {
    if let Err(e) = tokio::fs::write(workdir.join("stdout.txt"), &logs.stdout).await {
        tracing::error!(error = %e, "Failed to write stdout capture");
    }
    if let Err(e) = tokio::fs::write(workdir.join("stderr.txt"), &logs.stderr).await {
        tracing::error!(error = %e, "Failed to write stderr capture");
    }
    if let Some(code) = exit_code {
        if let Err(e) = tokio::fs::write(workdir.join("exitcode.txt"), code.to_string()).await {
            tracing::error!(error = %e, "Failed to write exit code marker");
        }
    }
}

fn combine_logs(logs: &CapturedLogs) -> String {
    if logs.stderr.is_empty() {
        logs.stdout.clone()
    } else if logs.stdout.is_empty() {
        logs.stderr.clone()
    } else {
        format!("{}\n{}", logs.stdout.trim_end(), logs.stderr)
    }
}

fn tail_lines(text: &str, tail: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(tail);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerState, RuntimeError};
    use async_trait::async_trait;

    /// Runtime whose containers exit immediately with a fixed code.
    struct InstantExitRuntime {
        exit_code: i64,
    }

    #[async_trait]
    impl ContainerRuntime for InstantExitRuntime {
        async fn launch(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
            Ok(format!("ctr-{}", spec.name))
        }

        async fn inspect(&self, _handle: &str) -> Result<ContainerState, RuntimeError> {
            Ok(ContainerState {
                running: false,
                exit_code: Some(self.exit_code),
            })
        }

        async fn logs(&self, _handle: &str, _tail: Option<usize>) -> Result<CapturedLogs, RuntimeError> {
            Ok(CapturedLogs::default())
        }

        async fn stop(&self, _handle: &str, _grace: Duration) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn remove(&self, _handle: &str) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    async fn completed_experiment(manager: &Arc<ExperimentManager>) -> ExperimentId {
        let id = manager
            .create("print('hi')", ExperimentConfig::default())
            .await
            .unwrap();
        manager.start(id).await.unwrap();
        let summary = manager.get_status(id).await.unwrap();
        assert!(summary.status.is_terminal());
        id
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_records_older_than_max_age() {
        let data_dir = tempfile::tempdir().unwrap();
        let manager = ExperimentManager::new(
            data_dir.path(),
            "http://localhost:8000",
            Arc::new(InstantExitRuntime { exit_code: 0 }),
        )
        .unwrap();

        let recent = completed_experiment(&manager).await;
        let old = completed_experiment(&manager).await;
        let older = completed_experiment(&manager).await;

        // Backdate end_times: 2h / 25h / 48h ago.
        {
            let mut experiments = manager.experiments.write().await;
            experiments.get_mut(&recent).unwrap().end_time =
                Some(Utc::now() - chrono::Duration::hours(2));
            experiments.get_mut(&old).unwrap().end_time =
                Some(Utc::now() - chrono::Duration::hours(25));
            experiments.get_mut(&older).unwrap().end_time =
                Some(Utc::now() - chrono::Duration::hours(48));
        }

        let removed = manager.sweep(chrono::Duration::hours(24)).await;
        assert_eq!(removed, 2);

        assert!(manager.get_status(recent).await.is_ok());
        assert!(manager.get_status(old).await.is_err());
        assert!(manager.get_status(older).await.is_err());
    }

    #[tokio::test]
    async fn sweep_ignores_records_without_end_time() {
        let data_dir = tempfile::tempdir().unwrap();
        let manager = ExperimentManager::new(
            data_dir.path(),
            "http://localhost:8000",
            Arc::new(InstantExitRuntime { exit_code: 0 }),
        )
        .unwrap();

        let id = manager
            .create("print('hi')", ExperimentConfig::default())
            .await
            .unwrap();
        // Never started: no end_time, must survive any sweep.
        let removed = manager.sweep(chrono::Duration::hours(0)).await;
        assert_eq!(removed, 0);
        assert!(manager.get_status(id).await.is_ok());
    }

    #[test]
    fn tail_lines_keeps_only_the_last_n() {
        let text = "a\nb\nc\nd";
        assert_eq!(tail_lines(text, 2), "c\nd");
        assert_eq!(tail_lines(text, 10), "a\nb\nc\nd");
    }

    #[test]
    fn combine_logs_merges_both_streams() {
        let both = CapturedLogs {
            stdout: "out\n".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(combine_logs(&both), "out\nerr\n");

        let only_err = CapturedLogs {
            stdout: String::new(),
            stderr: "err".into(),
        };
        assert_eq!(combine_logs(&only_err), "err");
    }
}
