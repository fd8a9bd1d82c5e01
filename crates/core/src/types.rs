//! Experiment identifiers, statuses, and wire-level summaries.

use serde::{Deserialize, Serialize};

/// Experiment identifiers are random UUIDs, assigned once at submission.
pub type ExperimentId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Lifecycle state of a submitted experiment.
///
/// Transitions are monotonic: `Created -> Starting -> Running -> terminal`,
/// with the exception that a launch failure moves `Starting` directly to
/// `Failed`. Once a terminal state is reached no further transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Record and working directory exist; the runtime has not been touched.
    Created,
    /// A container launch has been requested but no handle exists yet.
    Starting,
    /// A live container handle exists.
    Running,
    /// The script exited with code 0.
    Completed,
    /// The script exited nonzero, or the launch itself failed.
    Failed,
    /// The experiment was stopped by an operator or the duration watchdog.
    Stopped,
}

impl ExperimentStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Read-only view of an experiment record, as returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub id: ExperimentId,
    pub status: ExperimentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Exit code of the user script; set only on `completed`/`failed`
    /// when the process itself exited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    /// Set when failure was caused by infrastructure (launch or transport
    /// failure) rather than the script's own exit code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Listing of the files an experiment produced under its `output/` subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub id: ExperimentId,
    /// Paths relative to the `output/` directory.
    pub output_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}
