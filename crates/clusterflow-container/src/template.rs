//! Docker cluster template

use clusterflow_cloud::template::{require_non_empty, require_positive};
use clusterflow_cloud::{CloudError, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_node_count() -> u32 {
    1
}

/// Cluster description for the local container runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DockerEnvironment {
    /// Also used in container and network names
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    pub image: String,

    #[serde(default = "default_node_count")]
    pub node_count: u32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Docker accepts `[a-zA-Z0-9][a-zA-Z0-9_.-]*`
fn is_docker_name_safe(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl Template for DockerEnvironment {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn validate(&self) -> clusterflow_cloud::Result<()> {
        require_non_empty("clusterID", &self.cluster_id)?;
        if !is_docker_name_safe(&self.cluster_id) {
            return Err(CloudError::Validation(format!(
                "clusterID '{}' cannot be used in container names",
                self.cluster_id
            )));
        }
        require_non_empty("image", &self.image)?;
        require_positive("nodeCount", self.node_count)?;
        if self.environment.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(CloudError::Validation(
                "environment keys must be non-empty and must not contain '='".to_string(),
            ));
        }
        if matches!(&self.command, Some(cmd) if cmd.is_empty()) {
            return Err(CloudError::Validation("command must not be empty".to_string()));
        }
        Ok(())
    }
}
