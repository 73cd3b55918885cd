//! Sakura Cloud cluster template

use clusterflow_cloud::template::{require_non_empty, require_positive};
use clusterflow_cloud::{CloudError, Template};
use serde::{Deserialize, Serialize};

/// Zones usacloud accepts
pub const KNOWN_ZONES: &[&str] = &["is1a", "is1b", "tk1a", "tk1b", "tk1v"];

/// Cluster description for Sakura Cloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SakuraEnvironment {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    pub zone: String,

    /// Server plan, e.g. "2core-4gb"
    pub plan: String,

    pub server_count: u32,

    /// Disk size in GB
    pub disk_size: u32,

    /// OS type, e.g. "ubuntu2404"
    pub os_type: String,

    /// SSH key names registered in the account
    #[serde(default)]
    pub ssh_keys: Vec<String>,
}

impl SakuraEnvironment {
    pub fn server_plan(&self) -> clusterflow_cloud::Result<ServerPlan> {
        self.plan.parse()
    }
}

impl Template for SakuraEnvironment {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn validate(&self) -> clusterflow_cloud::Result<()> {
        require_non_empty("clusterID", &self.cluster_id)?;
        if !KNOWN_ZONES.contains(&self.zone.as_str()) {
            return Err(CloudError::Validation(format!(
                "unknown zone '{}' (expected one of {})",
                self.zone,
                KNOWN_ZONES.join(", ")
            )));
        }
        self.server_plan()?;
        require_positive("serverCount", self.server_count)?;
        require_positive("diskSize", self.disk_size)?;
        require_non_empty("osType", &self.os_type)?;
        for key in &self.ssh_keys {
            require_non_empty("sshKeys[]", key)?;
        }
        Ok(())
    }
}

/// Parsed "NcoreN-Mgb" plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPlan {
    pub core: u32,
    /// Memory in GB
    pub memory: u32,
}

impl std::str::FromStr for ServerPlan {
    type Err = CloudError;

    fn from_str(plan: &str) -> clusterflow_cloud::Result<Self> {
        let invalid = || CloudError::Validation(format!("invalid plan '{}' (expected e.g. 2core-4gb)", plan));

        let (core, memory) = plan.split_once('-').ok_or_else(invalid)?;
        let core = core
            .strip_suffix("core")
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let memory = memory
            .strip_suffix("gb")
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(invalid)?;

        if core == 0 || memory == 0 {
            return Err(invalid());
        }

        Ok(Self { core, memory })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_template() -> SakuraEnvironment {
        SakuraEnvironment {
            cluster_id: "spark-01".to_string(),
            zone: "tk1a".to_string(),
            plan: "2core-4gb".to_string(),
            server_count: 3,
            disk_size: 40,
            os_type: "ubuntu2404".to_string(),
            ssh_keys: vec!["ops".to_string()],
        }
    }

    #[test]
    fn test_parse_plan() {
        assert_eq!(
            "4core-8gb".parse::<ServerPlan>().unwrap(),
            ServerPlan { core: 4, memory: 8 }
        );
        assert!("4core".parse::<ServerPlan>().is_err());
        assert!("0core-8gb".parse::<ServerPlan>().is_err());
        assert!("fourcore-8gb".parse::<ServerPlan>().is_err());
    }

    #[test]
    fn test_valid_template() {
        assert!(valid_template().validate().is_ok());
    }

    #[test]
    fn test_zero_disk_size_rejected() {
        let mut template = valid_template();
        template.disk_size = 0;
        assert!(matches!(template.validate(), Err(CloudError::Validation(_))));
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let mut template = valid_template();
        template.zone = "us-east-1".to_string();
        assert!(matches!(template.validate(), Err(CloudError::Validation(_))));
    }

    #[test]
    fn test_from_blob_rejects_unknown_fields() {
        let blob = br#"{"clusterID":"c","zone":"tk1a","plan":"1core-1gb","serverCount":1,
            "diskSize":20,"osType":"ubuntu2404","imageBlob":"x"}"#;
        assert!(matches!(
            SakuraEnvironment::from_blob(blob),
            Err(CloudError::Deserialization(_))
        ));
    }
}
