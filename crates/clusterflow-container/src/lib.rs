//! Local container backend for ClusterFlow
//!
//! Each node of a cluster is a Docker container labelled with the cluster
//! ID and attached to a per-cluster bridge network.

pub mod converter;
pub mod error;
pub mod provider;
pub mod template;

pub use error::{ContainerError, Result};
pub use provider::DockerProvider;
pub use template::DockerEnvironment;
