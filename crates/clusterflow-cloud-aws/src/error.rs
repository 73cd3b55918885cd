//! AWS backend error types

use clusterflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AMI not found: {0}")]
    ImageNotFound(String),

    #[error("IAM instance profile not found: {0}")]
    RoleNotFound(String),

    #[error("AWS API error: {0}")]
    Api(String),
}

impl AwsError {
    /// Unresolvable references are the caller's to fix; the rest is a backend failure
    pub fn into_provision_error(self) -> CloudError {
        match self {
            AwsError::ImageNotFound(_) | AwsError::RoleNotFound(_) => {
                CloudError::Validation(self.to_string())
            }
            AwsError::Api(msg) => CloudError::Provision(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
