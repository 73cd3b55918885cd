//! ClusterFlow Control Plane daemon
//!
//! Serves the HTTP API in front of a [`clusterflow_controlplane::ControlPlane`]
//! and runs its reconciler.

pub mod api;
pub mod config;

pub use api::router;
pub use config::{ConfigError, DaemonConfig};
