//! Cloud backend error types

use crate::provider::ProviderKind;
use thiserror::Error;

/// Cloud backend errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// Template fields are missing, zero or reference something that does not exist.
    /// The caller must fix the input; never retried.
    #[error("Invalid template: {0}")]
    Validation(String),

    #[error("Malformed template: {0}")]
    Deserialization(String),

    /// Allocation failed. Nothing created by the attempt is left behind.
    #[error("Provisioning failed: {0}")]
    Provision(String),

    /// Teardown could not be confirmed.
    #[error("Destroy failed: {0}")]
    Destroy(String),

    #[error("Provider is disabled: {0}")]
    ProviderDisabled(ProviderKind),

    #[error("Provider is not available in this build: {0}")]
    ProviderUnavailable(ProviderKind),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

pub type Result<T> = std::result::Result<T, CloudError>;
