//! Sakura Cloud backend for ClusterFlow
//!
//! This crate implements the CloudEnvironment trait for Sakura Cloud,
//! provisioning a cluster as a group of servers tagged with the cluster ID.
//!
//! # Features
//!
//! - Server creation with plan / disk / OS / SSH keys
//! - Tag-based discovery, so destroy works from the template alone
//! - Idempotent teardown (servers already gone are skipped)
//!
//! # Requirements
//!
//! - `usacloud` CLI must be installed and configured
//! - Authentication is managed through usacloud configuration
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cloud::CloudEnvironment;
//! use clusterflow_cloud_sakura::SakuraCloudProvider;
//!
//! let provider = SakuraCloudProvider::from_blob(template_bytes)?;
//! let handle = provider.provision().await?;
//! // ...
//! provider.destroy().await?;
//! ```

pub mod error;
pub mod provider;
pub mod template;
pub mod usacloud;

pub use error::{Result, SakuraError};
pub use provider::SakuraCloudProvider;
pub use template::{KNOWN_ZONES, ServerPlan, SakuraEnvironment};
pub use usacloud::{CreateServerConfig, ServerInfo, SshKeyInfo, Usacloud};
