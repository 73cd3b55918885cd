//! Scriptable in-memory backends for tests

use crate::factory::{BackendFactory, ProviderToggles};
use async_trait::async_trait;
use clusterflow_cloud::template::{require_non_empty, require_positive};
use clusterflow_cloud::{
    CloudEnvironment, CloudError, InstanceHandle, ProviderKind, RetryConfig, Template,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Template understood by [`FakeFactory`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FakeTemplate {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
    #[serde(default = "default_nodes")]
    pub nodes: u32,
}

fn default_nodes() -> u32 {
    1
}

impl Template for FakeTemplate {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn validate(&self) -> clusterflow_cloud::Result<()> {
        require_non_empty("clusterID", &self.cluster_id)?;
        require_positive("nodes", self.nodes)
    }
}

/// Template bytes for a fake cluster
pub fn fake_template(cluster_id: &str) -> Vec<u8> {
    format!(r#"{{"clusterID":"{}","nodes":1}}"#, cluster_id).into_bytes()
}

/// Behaviour and call counters for one cluster ID
#[derive(Debug, Default)]
pub struct FakeScript {
    pub provision_calls: AtomicU32,
    pub destroy_calls: AtomicU32,
    pub destroy_in_flight: AtomicU32,
    pub max_destroy_in_flight: AtomicU32,
    fail_provision: AtomicBool,
    /// Destroy calls that fail before one succeeds; `u32::MAX` never succeeds
    destroy_failures: AtomicU32,
    destroy_delay: Mutex<Duration>,
}

impl FakeScript {
    pub fn fail_provision(&self) {
        self.fail_provision.store(true, Ordering::SeqCst);
    }

    pub fn fail_destroy_times(&self, times: u32) {
        self.destroy_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_destroy_always(&self) {
        self.fail_destroy_times(u32::MAX);
    }

    pub fn set_destroy_delay(&self, delay: Duration) {
        if let Ok(mut guard) = self.destroy_delay.lock() {
            *guard = delay;
        }
    }

    pub fn provisions(&self) -> u32 {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> u32 {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    fn delay(&self) -> Duration {
        self.destroy_delay.lock().map(|d| *d).unwrap_or_default()
    }
}

pub struct FakeBackend {
    kind: ProviderKind,
    template: FakeTemplate,
    script: Arc<FakeScript>,
}

#[async_trait]
impl CloudEnvironment for FakeBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn cluster_id(&self) -> &str {
        &self.template.cluster_id
    }

    async fn provision(&self) -> clusterflow_cloud::Result<InstanceHandle> {
        self.script.provision_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_provision.load(Ordering::SeqCst) {
            return Err(CloudError::Provision("scripted provision failure".to_string()));
        }

        let handle = (0..self.template.nodes).fold(
            InstanceHandle::new(&self.template.cluster_id, self.kind),
            |handle, i| handle.with_resource(format!("{}-{}", self.template.cluster_id, i)),
        );
        Ok(handle)
    }

    async fn destroy(&self) -> clusterflow_cloud::Result<()> {
        self.script.destroy_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.script.destroy_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script
            .max_destroy_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.script.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.script.destroy_in_flight.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.script.destroy_failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        if remaining != u32::MAX {
            self.script.destroy_failures.fetch_sub(1, Ordering::SeqCst);
        }
        Err(CloudError::Destroy("scripted destroy failure".to_string()))
    }
}

/// Factory producing [`FakeBackend`]s that share per-cluster scripts
#[derive(Default)]
pub struct FakeFactory {
    toggles: Mutex<ProviderToggles>,
    scripts: Mutex<HashMap<String, Arc<FakeScript>>>,
    pub create_calls: AtomicU32,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            toggles: Mutex::new(ProviderToggles::all()),
            ..Default::default()
        }
    }

    pub fn set_enabled(&self, kind: ProviderKind, enabled: bool) {
        if let Ok(mut toggles) = self.toggles.lock() {
            toggles.set(kind, enabled);
        }
    }

    /// Script for `cluster_id`, created on first use
    pub fn script(&self, cluster_id: &str) -> Arc<FakeScript> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts
            .entry(cluster_id.to_string())
            .or_default()
            .clone()
    }
}

impl BackendFactory for FakeFactory {
    fn create(
        &self,
        kind: ProviderKind,
        blob: &[u8],
    ) -> clusterflow_cloud::Result<Box<dyn CloudEnvironment>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let enabled = self
            .toggles
            .lock()
            .map(|t| t.is_enabled(kind))
            .unwrap_or(false);
        if !enabled {
            return Err(CloudError::ProviderDisabled(kind));
        }

        let template = FakeTemplate::from_blob(blob)?;
        let script = self.script(&template.cluster_id);
        Ok(Box::new(FakeBackend {
            kind,
            template,
            script,
        }))
    }
}

/// Retry budget with delays short enough for paused-clock tests
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
    }
}
