//! Heartbeat (check-in) payload
//!
//! Agents running inside a cluster periodically POST a [`CheckIn`] to the
//! orchestrator. The wire shape uses the field names `clusterID`,
//! `appExitStatus` and `status`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit status of the workload as reported by the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppExitStatus {
    /// Workload still running
    Running,
    Success,
    Failure,
    #[default]
    Unknown,
}

impl AppExitStatus {
    /// Whether the workload has finished (successfully or not)
    pub fn is_terminal(self) -> bool {
        matches!(self, AppExitStatus::Success | AppExitStatus::Failure)
    }
}

impl fmt::Display for AppExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppExitStatus::Running => write!(f, "running"),
            AppExitStatus::Success => write!(f, "success"),
            AppExitStatus::Failure => write!(f, "failure"),
            AppExitStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One heartbeat from an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    #[serde(default)]
    pub app_exit_status: AppExitStatus,

    /// Free-form agent status text
    #[serde(default)]
    pub status: String,
}

impl CheckIn {
    pub fn running(cluster_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            app_exit_status: AppExitStatus::Running,
            status: status.into(),
        }
    }

    pub fn finished(cluster_id: impl Into<String>, success: bool, status: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            app_exit_status: if success {
                AppExitStatus::Success
            } else {
                AppExitStatus::Failure
            },
            status: status.into(),
        }
    }
}
