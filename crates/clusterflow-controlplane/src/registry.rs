//! Cluster registry
//!
//! The only owner of cluster records. Every mutation happens under one write
//! lock and the lock is never held across a backend call, so operations on
//! the same cluster are linearizable and cheap.

use crate::error::{ControlPlaneError, Result};
use crate::model::{
    CancelOutcome, CheckInOutcome, ClusterRecord, ClusterStatus, DestroyTicket, StatusSummary,
    TeardownPolicy,
};
use chrono::{TimeDelta, Utc};
use clusterflow_cloud::{AppExitStatus, CheckIn, InstanceHandle, ProviderKind, TemplateBlob};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    records: HashMap<String, ClusterRecord>,
    /// IDs whose create is in flight
    reserved: HashSet<String>,
    /// IDs of pruned records
    tombstones: HashSet<String>,
}

impl Inner {
    fn is_taken(&self, cluster_id: &str) -> bool {
        self.records.contains_key(cluster_id)
            || self.reserved.contains(cluster_id)
            || self.tombstones.contains(cluster_id)
    }
}

#[derive(Default)]
pub struct ClusterRegistry {
    inner: RwLock<Inner>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an ID before provisioning
    pub async fn reserve(&self, cluster_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.is_taken(cluster_id) {
            return Err(ControlPlaneError::AlreadyExists(cluster_id.to_string()));
        }
        inner.reserved.insert(cluster_id.to_string());
        Ok(())
    }

    /// Release a reservation after a failed provision
    pub async fn abandon(&self, cluster_id: &str) {
        self.inner.write().await.reserved.remove(cluster_id);
    }

    /// Commit a provisioned cluster as `Running`
    pub async fn register(
        &self,
        template: TemplateBlob,
        handle: InstanceHandle,
    ) -> Result<StatusSummary> {
        let mut inner = self.inner.write().await;
        let cluster_id = handle.cluster_id.clone();

        inner.reserved.remove(&cluster_id);
        if inner.records.contains_key(&cluster_id) || inner.tombstones.contains(&cluster_id) {
            return Err(ControlPlaneError::AlreadyExists(cluster_id));
        }

        let record = ClusterRecord::new(template, handle);
        let summary = record.summary();
        inner.records.insert(cluster_id.clone(), record);

        tracing::info!(
            cluster_id = %cluster_id,
            provider = %summary.provider,
            resources = summary.resource_ids.len(),
            "Cluster registered"
        );
        Ok(summary)
    }

    /// Provider and stored template, used to rebuild a backend
    pub async fn lookup(&self, cluster_id: &str) -> Result<(ProviderKind, TemplateBlob)> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(cluster_id)
            .map(|r| (r.provider, r.template.clone()))
            .ok_or_else(|| ControlPlaneError::NotFound(cluster_id.to_string()))
    }

    pub async fn get_status(&self, cluster_id: &str) -> Result<StatusSummary> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(cluster_id)
            .map(ClusterRecord::summary)
            .ok_or_else(|| ControlPlaneError::NotFound(cluster_id.to_string()))
    }

    /// All records, oldest first
    pub async fn list(&self) -> Vec<StatusSummary> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<StatusSummary> =
            inner.records.values().map(ClusterRecord::summary).collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });
        summaries
    }

    /// Apply a heartbeat. Status only ever moves forward.
    pub async fn record_check_in(&self, check_in: &CheckIn) -> CheckInOutcome {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.records.get_mut(&check_in.cluster_id) else {
            tracing::warn!(cluster_id = %check_in.cluster_id, "Check-in for unknown cluster ignored");
            return CheckInOutcome::Ignored;
        };

        // Once the workload reported its outcome, or the cluster is gone,
        // heartbeats still in flight carry nothing newer
        let settled = record.status.is_terminal()
            || record.app_exit_status.is_some_and(AppExitStatus::is_terminal);
        if settled {
            tracing::debug!(
                cluster_id = %record.cluster_id,
                app_exit_status = %check_in.app_exit_status,
                status = %record.status,
                "Stale check-in ignored"
            );
            return CheckInOutcome::Recorded(record.status);
        }

        record.last_check_in = Some(Utc::now());
        record.app_exit_status = Some(check_in.app_exit_status);
        record.agent_status = Some(check_in.status.clone());

        if record.status == ClusterStatus::Running {
            match check_in.app_exit_status {
                AppExitStatus::Success => record.status = ClusterStatus::CheckedInOk,
                AppExitStatus::Failure => record.status = ClusterStatus::CheckedInFailed,
                AppExitStatus::Running | AppExitStatus::Unknown => {}
            }
        }
        record.touch();

        tracing::debug!(
            cluster_id = %record.cluster_id,
            app_exit_status = %check_in.app_exit_status,
            status = %record.status,
            "Check-in recorded"
        );
        CheckInOutcome::Recorded(record.status)
    }

    /// Record the intent to tear a cluster down
    pub async fn request_cancel(
        &self,
        cluster_id: &str,
        provider: ProviderKind,
    ) -> Result<CancelOutcome> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(cluster_id)
            .ok_or_else(|| ControlPlaneError::NotFound(cluster_id.to_string()))?;

        if record.provider != provider {
            return Err(ControlPlaneError::ProviderMismatch {
                cluster_id: cluster_id.to_string(),
                requested: provider,
                actual: record.provider,
            });
        }

        let outcome = match record.status {
            ClusterStatus::Terminated => return Ok(CancelOutcome::AlreadyTerminated),
            ClusterStatus::Destroying => CancelOutcome::InProgress,
            ClusterStatus::CancelRequested => CancelOutcome::AlreadyRequested,
            ClusterStatus::DestroyFailed => {
                record.status = ClusterStatus::CancelRequested;
                record.destroy_attempts = 0;
                CancelOutcome::Rearmed
            }
            ClusterStatus::Running | ClusterStatus::CheckedInOk | ClusterStatus::CheckedInFailed => {
                record.status = ClusterStatus::CancelRequested;
                CancelOutcome::Requested
            }
        };
        record.cancel_requested = true;
        record.touch();

        tracing::info!(cluster_id = %cluster_id, outcome = ?outcome, "Termination requested");
        Ok(outcome)
    }

    /// Move an eligible record to `Destroying`.
    ///
    /// Returns `None` when the record is missing, not eligible under `policy`
    /// or already owned by another destroy task.
    pub async fn begin_destroy(
        &self,
        cluster_id: &str,
        policy: &TeardownPolicy,
    ) -> Option<DestroyTicket> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(cluster_id)?;
        if !policy.wants(record.status) {
            return None;
        }

        record.status = ClusterStatus::Destroying;
        record.touch();

        Some(DestroyTicket {
            cluster_id: record.cluster_id.clone(),
            provider: record.provider,
            template: record.template.clone(),
        })
    }

    /// Count one failed destroy attempt; returns the attempts so far
    pub async fn record_destroy_failure(&self, cluster_id: &str, error: &str) -> u32 {
        let mut inner = self.inner.write().await;
        match inner.records.get_mut(cluster_id) {
            Some(record) if record.status == ClusterStatus::Destroying => {
                record.destroy_attempts += 1;
                record.last_error = Some(error.to_string());
                record.touch();
                record.destroy_attempts
            }
            _ => 0,
        }
    }

    /// Leave `Destroying` for `Terminated` or `DestroyFailed`
    pub async fn finish_destroy(&self, cluster_id: &str, result: std::result::Result<(), String>) {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.records.get_mut(cluster_id) else {
            return;
        };
        if record.status != ClusterStatus::Destroying {
            tracing::warn!(cluster_id = %cluster_id, status = %record.status, "Destroy finished for a record not in destroying");
            return;
        }

        match result {
            Ok(()) => {
                record.status = ClusterStatus::Terminated;
                record.terminated_at = Some(Utc::now());
                record.last_error = None;
                tracing::info!(cluster_id = %cluster_id, "Cluster terminated");
            }
            Err(error) => {
                record.status = ClusterStatus::DestroyFailed;
                tracing::error!(
                    cluster_id = %cluster_id,
                    attempts = record.destroy_attempts,
                    error = %error,
                    "Cluster teardown failed"
                );
                record.last_error = Some(error);
            }
        }
        record.touch();
    }

    /// IDs the reconciler should tear down under `policy`
    pub async fn teardown_candidates(&self, policy: &TeardownPolicy) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .records
            .values()
            .filter(|r| policy.wants(r.status))
            .map(|r| r.cluster_id.clone())
            .collect()
    }

    /// Drop records terminated more than `retention` ago.
    /// Their IDs stay reserved.
    pub async fn prune_terminated(&self, retention: Duration) -> usize {
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();

        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .records
            .values()
            .filter(|r| {
                r.status == ClusterStatus::Terminated
                    && r.terminated_at.is_some_and(|at| now - at >= retention)
            })
            .map(|r| r.cluster_id.clone())
            .collect();

        for cluster_id in &expired {
            inner.records.remove(cluster_id);
            inner.tombstones.insert(cluster_id.clone());
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Pruned terminated clusters");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> TemplateBlob {
        TemplateBlob::from(&br#"{"clusterID":"c1"}"#[..])
    }

    async fn registered(id: &str, provider: ProviderKind) -> ClusterRegistry {
        let registry = ClusterRegistry::new();
        registry.reserve(id).await.unwrap();
        registry
            .register(blob(), InstanceHandle::new(id, provider))
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_reserve_rejects_duplicates() {
        let registry = ClusterRegistry::new();
        registry.reserve("c1").await.unwrap();
        assert!(matches!(
            registry.reserve("c1").await,
            Err(ControlPlaneError::AlreadyExists(_))
        ));

        registry.abandon("c1").await;
        registry.reserve("c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_reservation_is_not_a_record() {
        let registry = ClusterRegistry::new();
        registry.reserve("c1").await.unwrap();
        assert!(matches!(
            registry.get_status("c1").await,
            Err(ControlPlaneError::NotFound(_))
        ));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_check_in_transitions() {
        let registry = registered("c1", ProviderKind::Docker).await;

        let outcome = registry.record_check_in(&CheckIn::running("c1", "up")).await;
        assert_eq!(outcome, CheckInOutcome::Recorded(ClusterStatus::Running));

        let outcome = registry
            .record_check_in(&CheckIn::finished("c1", true, "done"))
            .await;
        assert_eq!(outcome, CheckInOutcome::Recorded(ClusterStatus::CheckedInOk));

        // Later heartbeats never move the record back
        let outcome = registry.record_check_in(&CheckIn::running("c1", "again")).await;
        assert_eq!(outcome, CheckInOutcome::Recorded(ClusterStatus::CheckedInOk));

        let summary = registry.get_status("c1").await.unwrap();
        assert_eq!(summary.agent_status.as_deref(), Some("done"));
        assert_eq!(summary.app_exit_status, Some(AppExitStatus::Success));
        assert!(summary.last_check_in.is_some());
    }

    #[tokio::test]
    async fn test_late_running_check_in_keeps_final_outcome() {
        let registry = registered("c1", ProviderKind::Docker).await;
        registry
            .record_check_in(&CheckIn::finished("c1", false, "exit code 3"))
            .await;
        let before = registry.get_status("c1").await.unwrap();

        registry.record_check_in(&CheckIn::running("c1", "late")).await;
        registry.record_check_in(&CheckIn::finished("c1", true, "retry")).await;

        let after = registry.get_status("c1").await.unwrap();
        assert_eq!(after.status, ClusterStatus::CheckedInFailed);
        assert_eq!(after.app_exit_status, Some(AppExitStatus::Failure));
        assert_eq!(after.agent_status.as_deref(), Some("exit code 3"));
        assert_eq!(after.last_check_in, before.last_check_in);
    }

    #[tokio::test]
    async fn test_check_in_after_cancel_still_records_outcome() {
        let registry = registered("c1", ProviderKind::Docker).await;
        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        registry.record_check_in(&CheckIn::running("c1", "draining")).await;
        registry.record_check_in(&CheckIn::finished("c1", true, "done")).await;

        let summary = registry.get_status("c1").await.unwrap();
        assert_eq!(summary.status, ClusterStatus::CancelRequested);
        assert_eq!(summary.app_exit_status, Some(AppExitStatus::Success));
    }

    #[tokio::test]
    async fn test_check_in_unknown_cluster_ignored() {
        let registry = ClusterRegistry::new();
        let outcome = registry.record_check_in(&CheckIn::running("ghost", "")).await;
        assert_eq!(outcome, CheckInOutcome::Ignored);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_provider_mismatch_does_not_mutate() {
        let registry = registered("c1", ProviderKind::Aws).await;
        let err = registry
            .request_cancel("c1", ProviderKind::Docker)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::ProviderMismatch { .. }));

        let summary = registry.get_status("c1").await.unwrap();
        assert_eq!(summary.status, ClusterStatus::Running);
        assert!(!summary.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_after_check_in_never_reverts() {
        let registry = registered("c1", ProviderKind::Sakura).await;
        let outcome = registry.request_cancel("c1", ProviderKind::Sakura).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Requested);

        registry
            .record_check_in(&CheckIn::finished("c1", false, "crashed"))
            .await;
        let summary = registry.get_status("c1").await.unwrap();
        assert_eq!(summary.status, ClusterStatus::CancelRequested);
        assert!(summary.cancel_requested);
    }

    #[tokio::test]
    async fn test_begin_destroy_is_single_flight() {
        let registry = registered("c1", ProviderKind::Docker).await;
        let policy = TeardownPolicy::default();

        assert!(registry.begin_destroy("c1", &policy).await.is_none());

        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        let ticket = registry.begin_destroy("c1", &policy).await.unwrap();
        assert_eq!(ticket.provider, ProviderKind::Docker);
        assert!(registry.begin_destroy("c1", &policy).await.is_none());

        let outcome = registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        assert_eq!(outcome, CancelOutcome::InProgress);
        assert_eq!(
            registry.get_status("c1").await.unwrap().status,
            ClusterStatus::Destroying
        );
    }

    #[tokio::test]
    async fn test_destroy_failure_then_rearm() {
        let registry = registered("c1", ProviderKind::Docker).await;
        let policy = TeardownPolicy::default();
        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        registry.begin_destroy("c1", &policy).await.unwrap();

        assert_eq!(registry.record_destroy_failure("c1", "boom").await, 1);
        registry.finish_destroy("c1", Err("boom".to_string())).await;

        let summary = registry.get_status("c1").await.unwrap();
        assert_eq!(summary.status, ClusterStatus::DestroyFailed);
        assert_eq!(summary.last_error.as_deref(), Some("boom"));
        assert!(registry.teardown_candidates(&policy).await.is_empty());

        let outcome = registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Rearmed);
        assert_eq!(registry.teardown_candidates(&policy).await, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_terminated_is_final() {
        let registry = registered("c1", ProviderKind::Docker).await;
        let policy = TeardownPolicy::default();
        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        registry.begin_destroy("c1", &policy).await.unwrap();
        registry.finish_destroy("c1", Ok(())).await;

        let outcome = registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyTerminated);
        registry.record_check_in(&CheckIn::running("c1", "late")).await;
        assert_eq!(
            registry.get_status("c1").await.unwrap().status,
            ClusterStatus::Terminated
        );
    }

    #[tokio::test]
    async fn test_prune_keeps_tombstone() {
        let registry = registered("c1", ProviderKind::Docker).await;
        let policy = TeardownPolicy::default();
        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        registry.begin_destroy("c1", &policy).await.unwrap();
        registry.finish_destroy("c1", Ok(())).await;

        assert_eq!(registry.prune_terminated(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.prune_terminated(Duration::ZERO).await, 1);
        assert!(matches!(
            registry.get_status("c1").await,
            Err(ControlPlaneError::NotFound(_))
        ));
        assert!(matches!(
            registry.reserve("c1").await,
            Err(ControlPlaneError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_heartbeats_do_not_extend_retention() {
        let registry = registered("c1", ProviderKind::Docker).await;
        registry.request_cancel("c1", ProviderKind::Docker).await.unwrap();
        registry
            .begin_destroy("c1", &TeardownPolicy::default())
            .await
            .unwrap();
        registry.finish_destroy("c1", Ok(())).await;
        let terminated = registry.get_status("c1").await.unwrap();
        assert!(terminated.terminated_at.is_some());

        registry.record_check_in(&CheckIn::running("c1", "still here")).await;
        let after = registry.get_status("c1").await.unwrap();
        assert_eq!(after.updated_at, terminated.updated_at);
        assert_eq!(after.terminated_at, terminated.terminated_at);
        assert_eq!(after.agent_status, terminated.agent_status);

        assert_eq!(registry.prune_terminated(Duration::ZERO).await, 1);
    }
}
