//! Cluster records and the values the registry hands out

use chrono::{DateTime, Utc};
use clusterflow_cloud::{AppExitStatus, InstanceHandle, ProviderKind, TemplateBlob};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Provisioned, no terminal check-in yet
    Running,
    /// Agent reported a successful workload exit
    CheckedInOk,
    /// Agent reported a failed workload exit
    CheckedInFailed,
    CancelRequested,
    /// A destroy task owns the cluster
    Destroying,
    Terminated,
    /// Teardown gave up after its retry budget; a new termination request re-arms it
    DestroyFailed,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Running => "running",
            ClusterStatus::CheckedInOk => "checked_in_ok",
            ClusterStatus::CheckedInFailed => "checked_in_failed",
            ClusterStatus::CancelRequested => "cancel_requested",
            ClusterStatus::Destroying => "destroying",
            ClusterStatus::Terminated => "terminated",
            ClusterStatus::DestroyFailed => "destroy_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClusterStatus::Terminated | ClusterStatus::DestroyFailed)
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which statuses the reconciler tears down on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownPolicy {
    pub on_success: bool,
    pub on_failure: bool,
}

impl Default for TeardownPolicy {
    fn default() -> Self {
        Self {
            on_success: true,
            on_failure: false,
        }
    }
}

impl TeardownPolicy {
    pub fn wants(&self, status: ClusterStatus) -> bool {
        match status {
            ClusterStatus::CancelRequested => true,
            ClusterStatus::CheckedInOk => self.on_success,
            ClusterStatus::CheckedInFailed => self.on_failure,
            _ => false,
        }
    }
}

/// Registry entry for one cluster
#[derive(Debug, Clone)]
pub struct ClusterRecord {
    pub cluster_id: String,
    pub provider: ProviderKind,
    pub template: TemplateBlob,
    pub handle: InstanceHandle,
    pub status: ClusterStatus,
    pub cancel_requested: bool,
    pub last_check_in: Option<DateTime<Utc>>,
    pub app_exit_status: Option<AppExitStatus>,
    pub agent_status: Option<String>,
    pub destroy_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once teardown is confirmed; retention counts from here
    pub terminated_at: Option<DateTime<Utc>>,
}

impl ClusterRecord {
    pub fn new(template: TemplateBlob, handle: InstanceHandle) -> Self {
        let now = Utc::now();
        Self {
            cluster_id: handle.cluster_id.clone(),
            provider: handle.provider,
            template,
            handle,
            status: ClusterStatus::Running,
            cancel_requested: false,
            last_check_in: None,
            app_exit_status: None,
            agent_status: None,
            destroy_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            terminated_at: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            cluster_id: self.cluster_id.clone(),
            provider: self.provider,
            status: self.status,
            cancel_requested: self.cancel_requested,
            last_check_in: self.last_check_in,
            app_exit_status: self.app_exit_status,
            agent_status: self.agent_status.clone(),
            destroy_attempts: self.destroy_attempts,
            last_error: self.last_error.clone(),
            resource_ids: self.handle.resource_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            terminated_at: self.terminated_at,
        }
    }
}

/// Read-only view of a record, as returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
    pub provider: ProviderKind,
    pub status: ClusterStatus,
    pub cancel_requested: bool,
    pub last_check_in: Option<DateTime<Utc>>,
    pub app_exit_status: Option<AppExitStatus>,
    pub agent_status: Option<String>,
    pub destroy_attempts: u32,
    pub last_error: Option<String>,
    pub resource_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// Applied; carries the status after the check-in
    Recorded(ClusterStatus),
    /// Unknown cluster ID
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Requested,
    AlreadyRequested,
    /// A destroy is already running
    InProgress,
    AlreadyTerminated,
    /// Teardown had failed and is armed again
    Rearmed,
}

impl CancelOutcome {
    /// Whether the reconciler has new work
    pub fn needs_reconcile(&self) -> bool {
        matches!(
            self,
            CancelOutcome::Requested | CancelOutcome::AlreadyRequested | CancelOutcome::Rearmed
        )
    }
}

/// Handed to a destroy task when a record enters `Destroying`
#[derive(Debug, Clone)]
pub struct DestroyTicket {
    pub cluster_id: String,
    pub provider: ProviderKind,
    pub template: TemplateBlob,
}
