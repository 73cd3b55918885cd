//! Control plane error types

use clusterflow_cloud::{CloudError, ProviderKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("Invalid template: {0}")]
    Validation(String),

    #[error("Malformed template: {0}")]
    Deserialization(String),

    #[error("Cluster not found: {0}")]
    NotFound(String),

    #[error("Cluster '{cluster_id}' was created on {actual}, not {requested}")]
    ProviderMismatch {
        cluster_id: String,
        requested: ProviderKind,
        actual: ProviderKind,
    },

    #[error("Cluster already exists: {0}")]
    AlreadyExists(String),

    #[error("Provider is disabled: {0}")]
    ProviderDisabled(ProviderKind),

    #[error("Provider is not available in this build: {0}")]
    ProviderUnavailable(ProviderKind),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Destroy failed: {0}")]
    Destroy(String),
}

impl From<CloudError> for ControlPlaneError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Validation(msg) => ControlPlaneError::Validation(msg),
            CloudError::Deserialization(msg) => ControlPlaneError::Deserialization(msg),
            CloudError::Provision(msg) => ControlPlaneError::Provision(msg),
            CloudError::Destroy(msg) => ControlPlaneError::Destroy(msg),
            CloudError::ProviderDisabled(kind) => ControlPlaneError::ProviderDisabled(kind),
            CloudError::ProviderUnavailable(kind) => ControlPlaneError::ProviderUnavailable(kind),
            CloudError::UnknownProvider(name) => ControlPlaneError::UnknownProvider(name),
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_error_mapping() {
        assert!(matches!(
            ControlPlaneError::from(CloudError::Validation("x".into())),
            ControlPlaneError::Validation(_)
        ));
        assert!(matches!(
            ControlPlaneError::from(CloudError::ProviderDisabled(ProviderKind::Aws)),
            ControlPlaneError::ProviderDisabled(ProviderKind::Aws)
        ));
        assert!(matches!(
            ControlPlaneError::from(CloudError::Destroy("usacloud exited 1".into())),
            ControlPlaneError::Destroy(_)
        ));
    }

    #[test]
    fn test_mismatch_message_names_both_providers() {
        let err = ControlPlaneError::ProviderMismatch {
            cluster_id: "c1".to_string(),
            requested: ProviderKind::Docker,
            actual: ProviderKind::Aws,
        };
        let msg = err.to_string();
        assert!(msg.contains("aws"));
        assert!(msg.contains("docker"));
    }
}
