//! Control plane boundary operations
//!
//! The surface the HTTP API calls into. Validation always happens before any
//! side effect, and termination only records intent: the reconciler does the
//! actual teardown.

use crate::error::{ControlPlaneError, Result};
use crate::factory::BackendFactory;
use crate::model::{CancelOutcome, CheckInOutcome, StatusSummary, TeardownPolicy};
use crate::reconciler::{Reconciler, ReconcilerConfig, ReconcilerHandle};
use crate::registry::ClusterRegistry;
use clusterflow_cloud::{CheckIn, ProviderKind, TemplateBlob};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ControlPlane {
    registry: Arc<ClusterRegistry>,
    factory: Arc<dyn BackendFactory>,
    reconciler: ReconcilerHandle,
    policy: TeardownPolicy,
}

impl ControlPlane {
    pub fn new(
        registry: Arc<ClusterRegistry>,
        factory: Arc<dyn BackendFactory>,
        reconciler: ReconcilerHandle,
        policy: TeardownPolicy,
    ) -> Self {
        Self {
            registry,
            factory,
            reconciler,
            policy,
        }
    }

    /// Build a fresh registry, spawn its reconciler and return both
    pub fn start(
        factory: Arc<dyn BackendFactory>,
        config: ReconcilerConfig,
    ) -> (Self, JoinHandle<()>) {
        let registry = Arc::new(ClusterRegistry::new());
        let policy = config.policy;
        let (reconciler, handle) = Reconciler::new(registry.clone(), factory.clone(), config);
        let task = reconciler.spawn();
        (Self::new(registry, factory, handle, policy), task)
    }

    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    pub fn reconciler(&self) -> &ReconcilerHandle {
        &self.reconciler
    }

    /// Validate, provision and register a cluster
    #[tracing::instrument(skip(self, blob), fields(provider = %kind))]
    pub async fn create_cluster(&self, kind: ProviderKind, blob: &[u8]) -> Result<StatusSummary> {
        let backend = self.factory.create(kind, blob)?;
        let cluster_id = backend.cluster_id().to_string();

        self.registry.reserve(&cluster_id).await?;

        tracing::info!(cluster_id = %cluster_id, "Provisioning cluster");
        match backend.provision().await {
            Ok(handle) => self.registry.register(TemplateBlob::from(blob), handle).await,
            Err(e) => {
                self.registry.abandon(&cluster_id).await;
                tracing::error!(cluster_id = %cluster_id, error = %e, "Provisioning failed");
                Err(e.into())
            }
        }
    }

    pub async fn get_status(&self, cluster_id: &str) -> Result<StatusSummary> {
        self.registry.get_status(cluster_id).await
    }

    /// Record the intent to destroy a cluster and wake the reconciler.
    ///
    /// Returns as soon as the intent is recorded. Fails early if the stored
    /// template can no longer produce a backend.
    #[tracing::instrument(skip(self), fields(provider = %kind))]
    pub async fn request_termination(
        &self,
        kind: ProviderKind,
        cluster_id: &str,
    ) -> Result<CancelOutcome> {
        let (provider, template) = self.registry.lookup(cluster_id).await?;
        if provider != kind {
            return Err(ControlPlaneError::ProviderMismatch {
                cluster_id: cluster_id.to_string(),
                requested: kind,
                actual: provider,
            });
        }

        self.factory.create(provider, template.as_bytes())?;

        let outcome = self.registry.request_cancel(cluster_id, kind).await?;
        if outcome.needs_reconcile() {
            self.reconciler.notify(cluster_id);
        }
        Ok(outcome)
    }

    /// Apply a heartbeat; unknown clusters are ignored
    pub async fn check_in(&self, check_in: &CheckIn) -> CheckInOutcome {
        let outcome = self.registry.record_check_in(check_in).await;
        if let CheckInOutcome::Recorded(status) = outcome
            && self.policy.wants(status)
        {
            self.reconciler.notify(&check_in.cluster_id);
        }
        outcome
    }

    pub async fn list_clusters(&self) -> Vec<StatusSummary> {
        self.registry.list().await
    }
}
