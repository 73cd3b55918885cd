//! AWS EC2 provider implementation

use crate::ec2::{Ec2, LaunchRequest};
use crate::error::AwsError;
use crate::iam::Iam;
use crate::template::AwsEnvironment;
use async_trait::async_trait;
use clusterflow_cloud::{CloudEnvironment, CloudError, InstanceHandle, ProviderKind, Template};
use tokio::sync::OnceCell;

/// Tag key identifying the owning cluster
pub const CLUSTER_TAG_KEY: &str = "clusterflow:cluster-id";

/// SDK clients sharing one loaded config
struct Clients {
    ec2: Ec2,
    iam: Iam,
}

impl Clients {
    /// Default credential chain, pinned to `region`
    async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            ec2: Ec2::new(&config),
            iam: Iam::new(&config),
        }
    }
}

/// AWS provider bound to one cluster template
pub struct AwsProvider {
    template: AwsEnvironment,
    clients: OnceCell<Clients>,
}

impl AwsProvider {
    /// SDK clients are created lazily on first use
    pub fn new(template: AwsEnvironment) -> Self {
        Self {
            template,
            clients: OnceCell::new(),
        }
    }

    pub fn from_blob(blob: &[u8]) -> clusterflow_cloud::Result<Self> {
        Ok(Self::new(AwsEnvironment::from_blob(blob)?))
    }

    pub fn template(&self) -> &AwsEnvironment {
        &self.template
    }

    async fn clients(&self) -> &Clients {
        self.clients
            .get_or_init(|| Clients::connect(&self.template.region))
            .await
    }

    fn launch_request(&self) -> clusterflow_cloud::Result<LaunchRequest> {
        let mut tags: Vec<(String, String)> = self
            .template
            .tags
            .iter()
            .filter(|(k, _)| k.as_str() != CLUSTER_TAG_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        tags.push((CLUSTER_TAG_KEY.to_string(), self.template.cluster_id.clone()));
        if !self.template.tags.contains_key("Name") {
            tags.push(("Name".to_string(), self.template.cluster_id.clone()));
        }

        Ok(LaunchRequest {
            image_id: self.template.image_id.clone(),
            instance_type: self.template.instance_type.clone(),
            count: to_i32("instanceCount", self.template.instance_count)?,
            volume_size: to_i32("ebsVolumeSize", self.template.ebs_volume_size)?,
            instance_profile: self.template.iam_role.clone(),
            subnet_id: self.template.subnet_id.clone(),
            tags,
        })
    }
}

fn to_i32(field: &str, value: u32) -> clusterflow_cloud::Result<i32> {
    i32::try_from(value)
        .map_err(|_| CloudError::Validation(format!("{} is out of range: {}", field, value)))
}

#[async_trait]
impl CloudEnvironment for AwsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    fn cluster_id(&self) -> &str {
        &self.template.cluster_id
    }

    async fn provision(&self) -> clusterflow_cloud::Result<InstanceHandle> {
        let clients = self.clients().await;
        let request = self.launch_request()?;

        // Resolve references before anything is allocated
        clients
            .ec2
            .ensure_image(&self.template.image_id)
            .await
            .map_err(AwsError::into_provision_error)?;
        clients
            .iam
            .ensure_instance_profile(&self.template.iam_role)
            .await
            .map_err(AwsError::into_provision_error)?;

        tracing::info!(
            cluster_id = %self.template.cluster_id,
            region = %self.template.region,
            instance_type = %self.template.instance_type,
            count = self.template.instance_count,
            "Launching EC2 instances"
        );

        let ids = clients
            .ec2
            .run_instances(&request)
            .await
            .map_err(|e| CloudError::Provision(e.to_string()))?;

        let handle = ids.into_iter().fold(
            InstanceHandle::new(&self.template.cluster_id, ProviderKind::Aws),
            InstanceHandle::with_resource,
        );
        Ok(handle)
    }

    async fn destroy(&self) -> clusterflow_cloud::Result<()> {
        let ec2 = &self.clients().await.ec2;

        let ids = ec2
            .find_instances_by_tag(CLUSTER_TAG_KEY, &self.template.cluster_id)
            .await
            .map_err(|e| CloudError::Destroy(e.to_string()))?;

        if ids.is_empty() {
            tracing::debug!(cluster_id = %self.template.cluster_id, "No instances left to terminate");
            return Ok(());
        }

        tracing::info!(
            cluster_id = %self.template.cluster_id,
            instances = ?ids,
            "Terminating EC2 instances"
        );

        ec2.terminate_instances(&ids)
            .await
            .map_err(|e| CloudError::Destroy(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(extra: &str) -> AwsProvider {
        let blob = format!(
            r#"{{"clusterID":"spark-aws-01","region":"us-east-1",
                "imageId":"ami-0abcdef1234567890","instanceType":"m5.large",
                "instanceCount":2,"ebsVolumeSize":50,"iamRole":"spark-node"{}}}"#,
            extra
        );
        AwsProvider::from_blob(blob.as_bytes()).unwrap()
    }

    #[test]
    fn test_identity() {
        let provider = provider("");
        assert_eq!(provider.kind(), ProviderKind::Aws);
        assert_eq!(provider.cluster_id(), "spark-aws-01");
    }

    #[test]
    fn test_launch_request_tags_cluster() {
        let request = provider("").launch_request().unwrap();
        assert_eq!(request.count, 2);
        assert_eq!(request.volume_size, 50);
        assert!(
            request
                .tags
                .contains(&(CLUSTER_TAG_KEY.to_string(), "spark-aws-01".to_string()))
        );
        assert!(
            request
                .tags
                .contains(&("Name".to_string(), "spark-aws-01".to_string()))
        );
    }

    #[test]
    fn test_cluster_tag_cannot_be_overridden() {
        let request =
            provider(r#","tags":{"clusterflow:cluster-id":"other","team":"data"}"#)
                .launch_request()
                .unwrap();
        let cluster_tags: Vec<_> = request
            .tags
            .iter()
            .filter(|(k, _)| k == CLUSTER_TAG_KEY)
            .collect();
        assert_eq!(cluster_tags.len(), 1);
        assert_eq!(cluster_tags[0].1, "spark-aws-01");
        assert!(
            request
                .tags
                .contains(&("team".to_string(), "data".to_string()))
        );
    }

    #[test]
    fn test_counts_convert_without_truncation() {
        assert_eq!(to_i32("ebsVolumeSize", 16384).unwrap(), 16384);
        assert!(matches!(
            to_i32("ebsVolumeSize", u32::MAX),
            Err(CloudError::Validation(_))
        ));
    }
}
