//! AWS backend for ClusterFlow
//!
//! Provisions a cluster as a group of EC2 instances tagged with the cluster
//! ID. Teardown finds instances by that tag, so a provider rebuilt from the
//! stored template can destroy a cluster created by another instance.
//!
//! # Requirements
//!
//! - AWS credentials resolvable by the default provider chain
//!   (environment, profile, instance role, ...)

pub mod ec2;
pub mod error;
pub mod iam;
pub mod provider;
pub mod template;

pub use ec2::Ec2;
pub use error::{AwsError, Result};
pub use iam::Iam;
pub use provider::AwsProvider;
pub use template::AwsEnvironment;
