//! Sakura Cloud provider implementation

use crate::error::SakuraError;
use crate::template::SakuraEnvironment;
use crate::usacloud::{CreateServerConfig, Usacloud};
use async_trait::async_trait;
use clusterflow_cloud::{CloudEnvironment, CloudError, InstanceHandle, ProviderKind, Template};

/// Tag put on every server of a cluster
const CLUSTER_TAG_PREFIX: &str = "clusterflow.cluster:";

/// Sakura Cloud provider bound to one cluster template
pub struct SakuraCloudProvider {
    usacloud: Usacloud,
    template: SakuraEnvironment,
}

impl SakuraCloudProvider {
    pub fn new(template: SakuraEnvironment) -> Self {
        Self {
            usacloud: Usacloud::new(&template.zone),
            template,
        }
    }

    /// Deserialize + validate a template blob
    pub fn from_blob(blob: &[u8]) -> clusterflow_cloud::Result<Self> {
        Ok(Self::new(SakuraEnvironment::from_blob(blob)?))
    }

    pub fn template(&self) -> &SakuraEnvironment {
        &self.template
    }

    fn cluster_tag(&self) -> String {
        format!("{}{}", CLUSTER_TAG_PREFIX, self.template.cluster_id)
    }

    fn server_name(&self, index: u32) -> String {
        format!("{}-{}", self.template.cluster_id, index)
    }

    /// Map SSH key names to IDs; any missing name is a validation error
    async fn resolve_ssh_keys(&self) -> clusterflow_cloud::Result<Vec<String>> {
        if self.template.ssh_keys.is_empty() {
            return Ok(Vec::new());
        }

        let all_keys = self
            .usacloud
            .list_ssh_keys()
            .await
            .map_err(|e| CloudError::Provision(e.to_string()))?;

        self.template
            .ssh_keys
            .iter()
            .map(|name| {
                all_keys
                    .iter()
                    .find(|k| k.name == *name)
                    .map(|k| k.id.clone())
                    .ok_or_else(|| {
                        CloudError::Validation(SakuraError::SshKeyNotFound(name.clone()).to_string())
                    })
            })
            .collect()
    }

    /// Best-effort cleanup of servers created by a failed provision
    async fn rollback(&self, created: &[String]) {
        for id in created {
            if let Err(e) = self.usacloud.delete_server(id, true).await {
                tracing::warn!(
                    cluster_id = %self.template.cluster_id,
                    server_id = %id,
                    error = %e,
                    "Rollback failed to delete server"
                );
            }
        }
    }
}

#[async_trait]
impl CloudEnvironment for SakuraCloudProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sakura
    }

    fn cluster_id(&self) -> &str {
        &self.template.cluster_id
    }

    async fn provision(&self) -> clusterflow_cloud::Result<InstanceHandle> {
        let plan = self.template.server_plan()?;
        let ssh_key_ids = self.resolve_ssh_keys().await?;

        let existing = self
            .usacloud
            .find_servers_by_tag(&self.cluster_tag())
            .await
            .map_err(|e| CloudError::Provision(e.to_string()))?;
        if !existing.is_empty() {
            return Err(CloudError::Validation(format!(
                "{} server(s) already tagged for cluster {}",
                existing.len(),
                self.template.cluster_id
            )));
        }

        let mut handle = InstanceHandle::new(&self.template.cluster_id, ProviderKind::Sakura);
        let mut created = Vec::new();

        for index in 0..self.template.server_count {
            let config = CreateServerConfig {
                name: self.server_name(index),
                core: plan.core,
                memory: plan.memory,
                disk_size: self.template.disk_size,
                os_type: self.template.os_type.clone(),
                ssh_key_ids: ssh_key_ids.clone(),
                tags: vec![self.cluster_tag()],
            };

            tracing::info!(
                cluster_id = %self.template.cluster_id,
                zone = %self.usacloud.zone(),
                server = %config.name,
                "Creating server"
            );

            match self.usacloud.create_server(&config).await {
                Ok(server) => {
                    created.push(server.id.clone());
                    handle = handle.with_resource(server.id);
                }
                Err(e) => {
                    self.rollback(&created).await;
                    return Err(CloudError::Provision(e.to_string()));
                }
            }
        }

        Ok(handle)
    }

    async fn destroy(&self) -> clusterflow_cloud::Result<()> {
        let tag = self.cluster_tag();
        let servers = self
            .usacloud
            .find_servers_by_tag(&tag)
            .await
            .map_err(|e| CloudError::Destroy(e.to_string()))?;

        if servers.is_empty() {
            tracing::debug!(cluster_id = %self.template.cluster_id, "No servers left to delete");
            return Ok(());
        }

        for server in &servers {
            tracing::info!(
                cluster_id = %self.template.cluster_id,
                server_id = %server.id,
                "Deleting server"
            );
            if let Err(e) = self.usacloud.delete_server(&server.id, true).await {
                tracing::warn!(server_id = %server.id, error = %e, "Server deletion failed");
            }
        }

        // Confirm: anything still tagged means teardown is incomplete
        let remaining = self
            .usacloud
            .find_servers_by_tag(&tag)
            .await
            .map_err(|e| CloudError::Destroy(e.to_string()))?;

        if !remaining.is_empty() {
            let names: Vec<&str> = remaining.iter().map(|s| s.name.as_str()).collect();
            return Err(CloudError::Destroy(format!(
                "servers still present: {}",
                names.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SakuraCloudProvider {
        SakuraCloudProvider::from_blob(
            br#"{"clusterID":"spark-01","zone":"is1a","plan":"2core-4gb",
                "serverCount":2,"diskSize":40,"osType":"ubuntu2404"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_naming() {
        let provider = provider();
        assert_eq!(provider.cluster_id(), "spark-01");
        assert_eq!(provider.kind(), ProviderKind::Sakura);
        assert_eq!(provider.cluster_tag(), "clusterflow.cluster:spark-01");
        assert_eq!(provider.server_name(1), "spark-01-1");
    }

    #[test]
    fn test_from_blob_validation_error() {
        let result = SakuraCloudProvider::from_blob(
            br#"{"clusterID":"spark-01","zone":"is1a","plan":"2core-4gb",
                "serverCount":0,"diskSize":40,"osType":"ubuntu2404"}"#,
        );
        assert!(matches!(result, Err(CloudError::Validation(_))));
    }

    #[test]
    fn test_no_ssh_keys_resolves_without_cli() {
        let provider = provider();
        let keys = tokio_test::block_on(provider.resolve_ssh_keys()).unwrap();
        assert!(keys.is_empty());
    }
}
