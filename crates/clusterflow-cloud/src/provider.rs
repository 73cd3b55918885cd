//! Cloud backend trait definition

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Cloud backend abstraction trait
///
/// One implementation per infrastructure kind (AWS, Sakura Cloud, Docker).
/// An instance is bound to a single validated template, so `destroy` knows
/// exactly which cluster it tears down without any extra arguments.
#[async_trait]
pub trait CloudEnvironment: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> ProviderKind;

    /// Cluster identifier taken from the template
    fn cluster_id(&self) -> &str;

    /// Allocate the infrastructure described by the template.
    ///
    /// Implementations resolve every external reference (images, keys, ...)
    /// before allocating anything and return [`CloudError::Validation`] when
    /// one is missing. A failure after allocation started is rolled back on a
    /// best-effort basis and reported as [`CloudError::Provision`].
    async fn provision(&self) -> Result<InstanceHandle>;

    /// Tear down everything `provision` created for this cluster.
    ///
    /// Resources that are already gone are not an error, so calling this
    /// twice is a no-op the second time.
    async fn destroy(&self) -> Result<()>;
}

/// Infrastructure kind owning a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Public cloud A: AWS EC2
    Aws,
    /// Public cloud B: Sakura Cloud
    Sakura,
    /// Local container runtime: Docker
    Docker,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Aws, ProviderKind::Sakura, ProviderKind::Docker];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::Sakura => "sakura",
            ProviderKind::Docker => "docker",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(ProviderKind::Aws),
            "sakura" | "sakura-cloud" => Ok(ProviderKind::Sakura),
            "docker" => Ok(ProviderKind::Docker),
            other => Err(CloudError::UnknownProvider(other.to_string())),
        }
    }
}

/// What a successful `provision` returns: enough to find the resources again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub cluster_id: String,
    pub provider: ProviderKind,
    /// Provider-specific resource IDs (instance IDs, server IDs, container IDs)
    pub resource_ids: Vec<String>,
}

impl InstanceHandle {
    pub fn new(cluster_id: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            provider,
            resource_ids: Vec::new(),
        }
    }

    pub fn with_resource(mut self, id: impl Into<String>) -> Self {
        self.resource_ids.push(id.into());
        self
    }
}

/// Retry configuration for backend operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::try_from_secs_f64(delay)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
