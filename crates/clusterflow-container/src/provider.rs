//! Docker provider implementation

// Bollard 0.19 の非推奨APIを使用
#![allow(deprecated)]

use crate::converter::{self, cluster_list_options, network_name, node_container_config};
use crate::error::{ContainerError, Result};
use crate::template::DockerEnvironment;
use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as BollardError;
use clusterflow_cloud::{CloudEnvironment, CloudError, InstanceHandle, ProviderKind, Template};
use futures_util::StreamExt;

/// Docker provider bound to one cluster template
pub struct DockerProvider {
    template: DockerEnvironment,
}

fn is_status(err: &BollardError, code: u16) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == code
    )
}

fn remove_options() -> Option<bollard::query_parameters::RemoveContainerOptions> {
    Some(bollard::query_parameters::RemoveContainerOptions {
        force: true,
        ..Default::default()
    })
}

impl DockerProvider {
    pub fn new(template: DockerEnvironment) -> Self {
        Self { template }
    }

    pub fn from_blob(blob: &[u8]) -> clusterflow_cloud::Result<Self> {
        Ok(Self::new(DockerEnvironment::from_blob(blob)?))
    }

    pub fn template(&self) -> &DockerEnvironment {
        &self.template
    }

    fn connect(&self) -> Result<Docker> {
        Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))
    }

    /// イメージがローカルになければ pull する
    async fn ensure_image(&self, docker: &Docker) -> Result<()> {
        let image = converter::image_reference(&self.template.image);

        match docker.inspect_image(&image).await {
            Ok(_) => return Ok(()),
            Err(e) if is_status(&e, 404) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!(image = %image, "Pulling image");

        let (from_image, tag) = image
            .rsplit_once(':')
            .filter(|(_, tag)| !tag.contains('/'))
            .unwrap_or((image.as_str(), "latest"));

        let options = bollard::image::CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };

        let mut stream =
            docker.create_image(Some(options), None, None::<bollard::auth::DockerCredentials>);
        while let Some(info) = stream.next().await {
            match info {
                Ok(bollard::models::CreateImageInfo {
                    error: Some(reason), ..
                }) => {
                    return Err(ContainerError::ImageUnavailable {
                        image: image.clone(),
                        reason,
                    });
                }
                Ok(bollard::models::CreateImageInfo {
                    status: Some(status),
                    ..
                }) => {
                    tracing::debug!(image = %image, status = %status, "Pull progress");
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(ContainerError::ImageUnavailable {
                        image: image.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn create_network(&self, docker: &Docker) -> Result<()> {
        let request = bollard::models::NetworkCreateRequest {
            name: network_name(&self.template.cluster_id),
            driver: Some("bridge".to_string()),
            ..Default::default()
        };

        match docker.create_network(request).await {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_nodes(&self, docker: &Docker, created: &mut Vec<String>) -> Result<()> {
        for index in 0..self.template.node_count {
            let (config, options) = node_container_config(&self.template, index);

            tracing::info!(
                cluster_id = %self.template.cluster_id,
                container = %options.name,
                "Creating container"
            );

            let response = docker.create_container(Some(options), config).await?;
            created.push(response.id.clone());

            docker
                .start_container(
                    &response.id,
                    None::<bollard::query_parameters::StartContainerOptions>,
                )
                .await?;
        }
        Ok(())
    }

    /// コンテナとネットワークを削除（存在しないものは無視）
    async fn remove_all(&self, docker: &Docker, containers: &[String]) -> Result<()> {
        let mut first_error = None;

        for id in containers {
            match docker.remove_container(id, remove_options()).await {
                Ok(_) => {}
                Err(e) if is_status(&e, 404) => {}
                Err(e) => {
                    tracing::warn!(container = %id, error = %e, "Container removal failed");
                    if first_error.is_none() {
                        first_error = Some(ContainerError::from(e));
                    }
                }
            }
        }

        match docker.remove_network(&network_name(&self.template.cluster_id)).await {
            Ok(_) => {}
            Err(e) if is_status(&e, 404) => {}
            Err(e) => {
                tracing::warn!(cluster_id = %self.template.cluster_id, error = %e, "Network removal failed");
                if first_error.is_none() {
                    first_error = Some(ContainerError::from(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn cluster_containers(&self, docker: &Docker) -> Result<Vec<String>> {
        let containers = docker
            .list_containers(Some(cluster_list_options(&self.template.cluster_id)))
            .await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }
}

#[async_trait]
impl CloudEnvironment for DockerProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Docker
    }

    fn cluster_id(&self) -> &str {
        &self.template.cluster_id
    }

    async fn provision(&self) -> clusterflow_cloud::Result<InstanceHandle> {
        let docker = self.connect().map_err(ContainerError::into_provision_error)?;

        self.ensure_image(&docker)
            .await
            .map_err(ContainerError::into_provision_error)?;

        let existing = self
            .cluster_containers(&docker)
            .await
            .map_err(ContainerError::into_provision_error)?;
        if !existing.is_empty() {
            return Err(CloudError::Validation(format!(
                "{} container(s) already labelled for cluster {}",
                existing.len(),
                self.template.cluster_id
            )));
        }

        self.create_network(&docker)
            .await
            .map_err(ContainerError::into_provision_error)?;

        let mut created = Vec::new();
        if let Err(e) = self.start_nodes(&docker, &mut created).await {
            if let Err(cleanup) = self.remove_all(&docker, &created).await {
                tracing::warn!(
                    cluster_id = %self.template.cluster_id,
                    error = %cleanup,
                    "Rollback incomplete"
                );
            }
            return Err(e.into_provision_error());
        }

        let handle = created.into_iter().fold(
            InstanceHandle::new(&self.template.cluster_id, ProviderKind::Docker),
            InstanceHandle::with_resource,
        );
        Ok(handle)
    }

    async fn destroy(&self) -> clusterflow_cloud::Result<()> {
        let to_destroy_error = |e: ContainerError| CloudError::Destroy(e.to_string());

        let docker = self.connect().map_err(to_destroy_error)?;
        let containers = self.cluster_containers(&docker).await.map_err(to_destroy_error)?;

        tracing::info!(
            cluster_id = %self.template.cluster_id,
            containers = containers.len(),
            "Removing cluster containers"
        );

        self.remove_all(&docker, &containers)
            .await
            .map_err(to_destroy_error)?;

        let remaining = self.cluster_containers(&docker).await.map_err(to_destroy_error)?;
        if let Some(id) = remaining.into_iter().next() {
            return Err(to_destroy_error(ContainerError::ContainerStillPresent {
                container: id,
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let provider =
            DockerProvider::from_blob(br#"{"clusterID":"spark-local","image":"busybox"}"#).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Docker);
        assert_eq!(provider.cluster_id(), "spark-local");
        assert_eq!(provider.template().node_count, 1);
    }

    #[test]
    fn test_is_status() {
        let err = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such image".to_string(),
        };
        assert!(is_status(&err, 404));
        assert!(!is_status(&err, 409));
    }
}
