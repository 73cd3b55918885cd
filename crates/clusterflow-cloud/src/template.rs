//! Provisioning templates
//!
//! A template is the serialized, provider-specific description of a cluster.
//! The control plane keeps the raw bytes ([`TemplateBlob`]) for the lifetime
//! of a cluster so a backend can be rebuilt later purely for destruction.

use crate::error::{CloudError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Provider-specific template shape
pub trait Template: DeserializeOwned + Sized {
    /// Cluster identifier declared by the template
    fn cluster_id(&self) -> &str;

    /// Static validation, no external calls
    fn validate(&self) -> Result<()>;

    /// Deserialize and validate a template blob
    fn from_blob(blob: &[u8]) -> Result<Self> {
        let template: Self = serde_json::from_slice(blob)
            .map_err(|e| CloudError::Deserialization(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }
}

/// Immutable serialized template, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBlob(Arc<[u8]>);

impl TemplateBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for TemplateBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for TemplateBlob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for TemplateBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Fail with a validation error when `value` is blank
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CloudError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Fail with a validation error when `value` is zero
pub fn require_positive(field: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(CloudError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}
