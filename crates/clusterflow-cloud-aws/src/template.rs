//! AWS cluster template

use clusterflow_cloud::template::{require_non_empty, require_positive};
use clusterflow_cloud::{CloudError, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound for a single RunInstances call
const MAX_INSTANCES: u32 = 1000;

/// Largest gp2/gp3 volume EC2 accepts, in GiB
const MAX_EBS_VOLUME_SIZE: u32 = 16384;

/// Cluster description for AWS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AwsEnvironment {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    pub region: String,

    /// AMI ID ("ami-...")
    pub image_id: String,

    /// e.g. "m5.xlarge"
    pub instance_type: String,

    pub instance_count: u32,

    /// Root EBS volume size in GiB
    pub ebs_volume_size: u32,

    /// IAM instance profile attached to every instance
    pub iam_role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Extra tags; the cluster tag is always added
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Template for AwsEnvironment {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn validate(&self) -> clusterflow_cloud::Result<()> {
        require_non_empty("clusterID", &self.cluster_id)?;
        require_non_empty("region", &self.region)?;
        require_non_empty("imageId", &self.image_id)?;
        if !self.image_id.starts_with("ami-") {
            return Err(CloudError::Validation(format!(
                "imageId '{}' is not an AMI ID",
                self.image_id
            )));
        }
        require_non_empty("instanceType", &self.instance_type)?;
        require_positive("instanceCount", self.instance_count)?;
        if self.instance_count > MAX_INSTANCES {
            return Err(CloudError::Validation(format!(
                "instanceCount must be at most {}",
                MAX_INSTANCES
            )));
        }
        require_positive("ebsVolumeSize", self.ebs_volume_size)?;
        if self.ebs_volume_size > MAX_EBS_VOLUME_SIZE {
            return Err(CloudError::Validation(format!(
                "ebsVolumeSize must be at most {} GiB",
                MAX_EBS_VOLUME_SIZE
            )));
        }
        require_non_empty("iamRole", &self.iam_role)?;
        if let Some(subnet) = &self.subnet_id {
            require_non_empty("subnetId", subnet)?;
        }
        Ok(())
    }
}
