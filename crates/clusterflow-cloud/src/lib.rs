//! ClusterFlow Cloud Backends
//!
//! This crate provides the backend abstraction for ClusterFlow: every
//! infrastructure kind that can host a cluster implements
//! [`CloudEnvironment`], and the control plane only ever talks to that trait.
//!
//! # Supported Backends
//!
//! - **AWS** (cloud A): EC2 instances (via aws-sdk-ec2, `clusterflow-cloud-aws`)
//! - **Sakura Cloud** (cloud B): servers + disks (via usacloud CLI, `clusterflow-cloud-sakura`)
//! - **Docker** (local): containers on the local engine (via bollard, `clusterflow-container`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              clusterflow-controlplane            │
//! │      (registry / factory / reconciler)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterflow-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Backend Abstraction              │   │
//! │  │  trait CloudEnvironment { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Templates   │  │  Heartbeat   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬─────────────┬─────────┘
//!         │                 │             │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌───▼─────────┐
//! │      aws      │ │ sakura-cloud  │ │   docker    │
//! └───────────────┘ └───────────────┘ └─────────────┘
//! ```

pub mod error;
pub mod heartbeat;
pub mod provider;
pub mod template;

// Re-exports
pub use error::{CloudError, Result};
pub use heartbeat::{AppExitStatus, CheckIn};
pub use provider::{CloudEnvironment, InstanceHandle, ProviderKind, RetryConfig};
pub use template::{Template, TemplateBlob};
