//! Projection of raw Job status onto the caller-facing run status

use k8s_openapi::api::batch::v1::{Job, JobStatus};
use serde::{Deserialize, Serialize};

/// Caller-facing status of a training run
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one pod of the run is active
    Active,
    /// The run completed successfully
    Succeeded,
    /// The run failed
    Failed,
    /// The orchestrator has not reported anything decisive yet
    #[default]
    Unknown,
}

impl RunStatus {
    /// Succeeded and Failed never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Active => write!(f, "Active"),
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Pod counters reported by the orchestrator for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawStatus {
    /// Pods currently running
    pub active: i32,
    /// Pods that completed successfully
    pub succeeded: i32,
    /// Pods that failed
    pub failed: i32,
}

impl From<&JobStatus> for RawStatus {
    fn from(status: &JobStatus) -> Self {
        Self {
            active: status.active.unwrap_or(0),
            succeeded: status.succeeded.unwrap_or(0),
            failed: status.failed.unwrap_or(0),
        }
    }
}

impl From<&Job> for RawStatus {
    fn from(job: &Job) -> Self {
        job.status.as_ref().map(RawStatus::from).unwrap_or_default()
    }
}

/// Project raw counters onto a run status.
///
/// Counters overlap while a Job transitions, so precedence is fixed:
/// active, then succeeded, then failed.
pub fn project(raw: &RawStatus) -> RunStatus {
    if raw.active > 0 {
        RunStatus::Active
    } else if raw.succeeded > 0 {
        RunStatus::Succeeded
    } else if raw.failed > 0 {
        RunStatus::Failed
    } else {
        RunStatus::Unknown
    }
}
