//! usacloud CLI wrapper
//!
//! Wraps the usacloud CLI commands for Sakura Cloud operations.

use crate::error::{Result, SakuraError};
use serde::{Deserialize, Deserializer, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// usacloud CLI wrapper
pub struct Usacloud {
    zone: String,
}

impl Usacloud {
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Run a usacloud command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("usacloud");
        cmd.arg("--zone").arg(&self.zone);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: usacloud --zone {} {}", self.zone, args.join(" "));

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SakuraError::UsacloudNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SakuraError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// List servers carrying `tag`
    pub async fn find_servers_by_tag(&self, tag: &str) -> Result<Vec<ServerInfo>> {
        let output = self
            .run_command(&["server", "list", "--tags", tag, "--output-type", "json"])
            .await?;

        // --tags is a server-side filter, but double check locally
        Ok(parse_list::<ServerInfo>(&output)?
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect())
    }

    /// Create a server
    pub async fn create_server(&self, config: &CreateServerConfig) -> Result<ServerInfo> {
        // Store string conversions to extend their lifetime
        let core_str = config.core.to_string();
        let memory_str = config.memory.to_string();
        let disk_size_str = config.disk_size.to_string();
        let tags_str = config.tags.join(",");

        let mut args = vec![
            "server",
            "create",
            "--name",
            config.name.as_str(),
            "--core",
            core_str.as_str(),
            "--memory",
            memory_str.as_str(),
            "--disk-size",
            disk_size_str.as_str(),
            "--os-type",
            config.os_type.as_str(),
            "--output-type",
            "json",
            "--yes",
        ];

        if !config.tags.is_empty() {
            args.push("--tags");
            args.push(tags_str.as_str());
        }

        for id in &config.ssh_key_ids {
            args.push("--disk-edit-ssh-key-id");
            args.push(id.as_str());
        }

        let output = self.run_command(&args).await?;

        // `server create` prints a one-element array
        let mut servers: Vec<ServerInfo> = parse_list(&output)?;
        servers
            .pop()
            .ok_or_else(|| SakuraError::CommandFailed("server create returned nothing".to_string()))
    }

    /// Delete a server (forced shutdown first)
    pub async fn delete_server(&self, id: &str, with_disks: bool) -> Result<()> {
        let mut args = vec!["server", "delete", id, "--force-shutdown", "--yes"];

        if with_disks {
            args.push("--with-disks");
        }

        self.run_command(&args).await?;
        Ok(())
    }

    /// List SSH keys
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>> {
        let output = self
            .run_command(&["ssh-key", "list", "--output-type", "json"])
            .await?;

        parse_list(&output)
    }
}

/// usacloud prints nothing (or `[]`) for empty lists
fn parse_list<T: serde::de::DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }

    Ok(serde_json::from_str(trimmed)?)
}

/// Sakura IDs are 12-digit numbers; usacloud prints them as numbers or strings
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected ID: {}", other))),
    }
}

/// Server information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "InstanceStatus")]
    pub instance_status: Option<String>,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
}

impl ServerInfo {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Configuration for creating a server
#[derive(Debug, Clone)]
pub struct CreateServerConfig {
    pub name: String,
    pub core: u32,
    pub memory: u32,
    pub disk_size: u32,
    pub os_type: String,
    pub ssh_key_ids: Vec<String>,
    pub tags: Vec<String>,
}

/// SSH key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyInfo {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,
}
