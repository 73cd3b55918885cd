//! Backend factory
//!
//! Turns `(provider, template bytes)` into a ready backend. Used both to
//! create clusters and to rebuild a backend from a stored template for
//! teardown. Has no side effects.

use clusterflow_cloud::{CloudEnvironment, CloudError, ProviderKind};
use clusterflow_cloud_sakura::SakuraCloudProvider;
use clusterflow_container::DockerProvider;

pub trait BackendFactory: Send + Sync {
    /// Deserialize and validate `blob` for `kind`
    fn create(
        &self,
        kind: ProviderKind,
        blob: &[u8],
    ) -> clusterflow_cloud::Result<Box<dyn CloudEnvironment>>;
}

/// Which providers the daemon serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderToggles {
    pub aws: bool,
    pub sakura: bool,
    pub docker: bool,
}

impl Default for ProviderToggles {
    fn default() -> Self {
        Self {
            aws: false,
            sakura: true,
            docker: true,
        }
    }
}

impl ProviderToggles {
    pub fn all() -> Self {
        Self {
            aws: true,
            sakura: true,
            docker: true,
        }
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Aws => self.aws,
            ProviderKind::Sakura => self.sakura,
            ProviderKind::Docker => self.docker,
        }
    }

    pub fn set(&mut self, kind: ProviderKind, enabled: bool) {
        match kind {
            ProviderKind::Aws => self.aws = enabled,
            ProviderKind::Sakura => self.sakura = enabled,
            ProviderKind::Docker => self.docker = enabled,
        }
    }
}

/// Production factory backed by the real providers
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    toggles: ProviderToggles,
}

impl ProviderFactory {
    pub fn new(toggles: ProviderToggles) -> Self {
        Self { toggles }
    }
}

#[cfg(feature = "aws-cloud")]
fn aws_backend(blob: &[u8]) -> clusterflow_cloud::Result<Box<dyn CloudEnvironment>> {
    Ok(Box::new(clusterflow_cloud_aws::AwsProvider::from_blob(blob)?))
}

#[cfg(not(feature = "aws-cloud"))]
fn aws_backend(_blob: &[u8]) -> clusterflow_cloud::Result<Box<dyn CloudEnvironment>> {
    Err(CloudError::ProviderUnavailable(ProviderKind::Aws))
}

impl BackendFactory for ProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        blob: &[u8],
    ) -> clusterflow_cloud::Result<Box<dyn CloudEnvironment>> {
        if !self.toggles.is_enabled(kind) {
            return Err(CloudError::ProviderDisabled(kind));
        }

        match kind {
            ProviderKind::Aws => aws_backend(blob),
            ProviderKind::Sakura => Ok(Box::new(SakuraCloudProvider::from_blob(blob)?)),
            ProviderKind::Docker => Ok(Box::new(DockerProvider::from_blob(blob)?)),
        }
    }
}
