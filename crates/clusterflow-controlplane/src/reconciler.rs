//! Lifecycle reconciler
//!
//! Background loop that drives clusters from "teardown wanted" to
//! `Terminated`. It reacts to notifications from the control plane and also
//! sweeps the registry periodically, so a lost notification only delays
//! teardown until the next sweep.
//!
//! Each teardown runs in its own task. The registry's `begin_destroy` is the
//! only way into `Destroying`, so at most one destroy is in flight per
//! cluster no matter how many notifications arrive.

use crate::factory::BackendFactory;
use crate::model::{DestroyTicket, TeardownPolicy};
use crate::registry::ClusterRegistry;
use crate::retry::retry_with_backoff;
use clusterflow_cloud::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub sweep_interval: Duration,
    /// Budget for one teardown
    pub retry: RetryConfig,
    pub policy: TeardownPolicy,
    /// How long `Terminated` records are kept; `None` keeps them forever
    pub retention: Option<Duration>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            retry: RetryConfig::default(),
            policy: TeardownPolicy::default(),
            retention: Some(Duration::from_secs(3600)),
        }
    }
}

enum Command {
    Reconcile(String),
    Shutdown,
}

/// Cheap handle for waking the reconciler
#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ReconcilerHandle {
    /// Ask the reconciler to look at one cluster
    pub fn notify(&self, cluster_id: &str) {
        if self.tx.send(Command::Reconcile(cluster_id.to_string())).is_err() {
            tracing::debug!(cluster_id = %cluster_id, "Reconciler stopped, notification dropped");
        }
    }

    /// Stop accepting work; in-flight teardowns still finish
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

pub struct Reconciler {
    registry: Arc<ClusterRegistry>,
    factory: Arc<dyn BackendFactory>,
    config: ReconcilerConfig,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Reconciler {
    pub fn new(
        registry: Arc<ClusterRegistry>,
        factory: Arc<dyn BackendFactory>,
        config: ReconcilerConfig,
    ) -> (Self, ReconcilerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reconciler = Self {
            registry,
            factory,
            config,
            rx,
        };
        (reconciler, ReconcilerHandle { tx })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            max_attempts = self.config.retry.max_attempts,
            "Reconciler started"
        );

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Reconcile(cluster_id)) => self.start(&mut tasks, &cluster_id).await,
                    Some(Command::Shutdown) | None => break,
                },
                _ = sweep.tick() => self.sweep(&mut tasks).await,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Teardown supervisor failed");
                    }
                }
            }
        }

        tracing::info!(in_flight = tasks.len(), "Reconciler stopping");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Teardown supervisor failed");
            }
        }
    }

    async fn start(&self, tasks: &mut JoinSet<()>, cluster_id: &str) {
        let Some(ticket) = self
            .registry
            .begin_destroy(cluster_id, &self.config.policy)
            .await
        else {
            return;
        };

        tracing::info!(cluster_id = %ticket.cluster_id, provider = %ticket.provider, "Starting teardown");
        tasks.spawn(supervise(
            self.registry.clone(),
            self.factory.clone(),
            self.config.retry.clone(),
            ticket,
        ));
    }

    async fn sweep(&self, tasks: &mut JoinSet<()>) {
        for cluster_id in self.registry.teardown_candidates(&self.config.policy).await {
            self.start(tasks, &cluster_id).await;
        }
        if let Some(retention) = self.config.retention {
            self.registry.prune_terminated(retention).await;
        }
    }
}

/// Runs one teardown in its own task so a panic only fails that cluster
async fn supervise(
    registry: Arc<ClusterRegistry>,
    factory: Arc<dyn BackendFactory>,
    retry: RetryConfig,
    ticket: DestroyTicket,
) {
    let cluster_id = ticket.cluster_id.clone();
    let worker = tokio::spawn(destroy_cluster(registry.clone(), factory, retry, ticket));

    if let Err(e) = worker.await {
        tracing::error!(cluster_id = %cluster_id, error = %e, "Teardown task aborted");
        registry
            .finish_destroy(&cluster_id, Err(format!("teardown task aborted: {}", e)))
            .await;
    }
}

async fn destroy_cluster(
    registry: Arc<ClusterRegistry>,
    factory: Arc<dyn BackendFactory>,
    retry: RetryConfig,
    ticket: DestroyTicket,
) {
    let cluster_id = ticket.cluster_id.as_str();

    let backend = match factory.create(ticket.provider, ticket.template.as_bytes()) {
        Ok(backend) => backend,
        Err(e) => {
            registry
                .finish_destroy(cluster_id, Err(format!("cannot rebuild backend: {}", e)))
                .await;
            return;
        }
    };

    let backend = backend.as_ref();
    let registry_ref = registry.as_ref();
    let result = retry_with_backoff(&retry, "destroy", || async move {
        let result = backend.destroy().await;
        if let Err(e) = &result {
            let attempts = registry_ref
                .record_destroy_failure(cluster_id, &e.to_string())
                .await;
            tracing::warn!(cluster_id = %cluster_id, attempts, error = %e, "Destroy attempt failed");
        }
        result
    })
    .await;

    registry
        .finish_destroy(cluster_id, result.map_err(|e| e.to_string()))
        .await;
}
