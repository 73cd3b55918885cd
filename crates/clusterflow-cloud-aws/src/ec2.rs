//! Thin EC2 client wrapper
//!
//! Only the calls the backend needs: image lookup, launch, tag lookup and
//! termination.

use crate::error::{AwsError, Result};
use aws_config::SdkConfig;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, Filter, IamInstanceProfileSpecification, InstanceType,
    ResourceType, Tag, TagSpecification,
};

/// Instance states that still hold resources
const LIVE_STATES: &[&str] = &["pending", "running", "stopping", "stopped"];

/// Root device for Amazon Linux / Ubuntu AMIs
const ROOT_DEVICE: &str = "/dev/xvda";

/// Launch request for a group of identical instances
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub image_id: String,
    pub instance_type: String,
    pub count: i32,
    pub volume_size: i32,
    pub instance_profile: String,
    pub subnet_id: Option<String>,
    pub tags: Vec<(String, String)>,
}

/// EC2 wrapper for one region
pub struct Ec2 {
    client: Client,
}

impl Ec2 {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Confirm the AMI exists and is visible to this account
    pub async fn ensure_image(&self, image_id: &str) -> Result<()> {
        let output = match self.client.describe_images().image_ids(image_id).send().await {
            Ok(output) => output,
            Err(e) if e.code().is_some_and(|c| c.starts_with("InvalidAMIID")) => {
                return Err(AwsError::ImageNotFound(image_id.to_string()));
            }
            Err(e) => return Err(AwsError::Api(DisplayErrorContext(&e).to_string())),
        };

        if output.images().is_empty() {
            return Err(AwsError::ImageNotFound(image_id.to_string()));
        }
        Ok(())
    }

    /// Launch instances; returns their IDs
    pub async fn run_instances(&self, request: &LaunchRequest) -> Result<Vec<String>> {
        let tags = request
            .tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect::<Vec<_>>();

        let output = self
            .client
            .run_instances()
            .image_id(&request.image_id)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .min_count(request.count)
            .max_count(request.count)
            .iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .name(&request.instance_profile)
                    .build(),
            )
            .block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name(ROOT_DEVICE)
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(request.volume_size)
                            .delete_on_termination(true)
                            .build(),
                    )
                    .build(),
            )
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            )
            .set_subnet_id(request.subnet_id.clone())
            .send()
            .await
            .map_err(|e| AwsError::Api(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .instances()
            .iter()
            .filter_map(|i| i.instance_id().map(str::to_string))
            .collect())
    }

    /// IDs of live instances carrying `key=value`
    pub async fn find_instances_by_tag(&self, key: &str, value: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", key))
                    .values(value)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(LIVE_STATES.iter().map(|s| s.to_string()).collect()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AwsError::Api(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(|i| i.instance_id().map(str::to_string))
            .collect())
    }

    pub async fn terminate_instances(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| AwsError::Api(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
