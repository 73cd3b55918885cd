use clusterflow_controlplane::testing::{FakeFactory, fast_retry};
use clusterflow_controlplane::{ClusterStatus, ControlPlane, ReconcilerConfig, TeardownPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct TestPlane {
    pub plane: ControlPlane,
    pub factory: Arc<FakeFactory>,
    #[allow(dead_code)]
    pub reconciler: JoinHandle<()>,
}

/// Sweep interval long enough that only notifications drive teardown
pub const NO_SWEEP: Duration = Duration::from_secs(24 * 3600);

impl TestPlane {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig {
            sweep_interval: NO_SWEEP,
            retry: fast_retry(3),
            policy: TeardownPolicy::default(),
            retention: None,
        })
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let factory = Arc::new(FakeFactory::new());
        let (plane, reconciler) = ControlPlane::start(factory.clone(), config);
        Self {
            plane,
            factory,
            reconciler,
        }
    }

    /// Poll until the cluster reaches `status`; panics after ~10s of (virtual) time
    pub async fn wait_for(&self, cluster_id: &str, status: ClusterStatus) {
        for _ in 0..1000 {
            let current = self.plane.get_status(cluster_id).await.unwrap().status;
            if current == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let current = self.plane.get_status(cluster_id).await.unwrap().status;
        panic!("cluster {cluster_id} stuck in {current}, expected {status}");
    }

    /// Let the reconciler drain pending work
    #[allow(dead_code)]
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
