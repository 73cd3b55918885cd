//! ClusterFlow Control Plane
//!
//! Keeps the registry of clusters, builds backends from templates and runs
//! the reconciler that tears clusters down.
//!
//! ```text
//!  create ──► factory ──► provision ──► registry (Running)
//!  check-in ─────────────────────────► registry ──┐
//!  terminate ──► registry (CancelRequested) ──────┤ notify
//!                                                 ▼
//!                          reconciler ──► factory ──► destroy ──► Terminated
//! ```

pub mod controlplane;
pub mod error;
pub mod factory;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use controlplane::ControlPlane;
pub use error::{ControlPlaneError, Result};
pub use factory::{BackendFactory, ProviderFactory, ProviderToggles};
pub use model::{
    CancelOutcome, CheckInOutcome, ClusterRecord, ClusterStatus, DestroyTicket, StatusSummary,
    TeardownPolicy,
};
pub use reconciler::{Reconciler, ReconcilerConfig, ReconcilerHandle};
pub use registry::ClusterRegistry;
pub use retry::retry_with_backoff;
