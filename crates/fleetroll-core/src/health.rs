//! Cluster health poller
//!
//! Queries the orchestrator's readiness condition for a node at a fixed
//! interval, up to a fixed attempt budget. A query transport failure counts
//! as a failed attempt rather than aborting the loop, since the node may be
//! mid-recovery while the API server catches up.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::cluster::ClusterClient;
use crate::config::Timing;
use crate::state::HealthState;

/// Waits for a cluster node to report ready
pub struct HealthPoller {
    cluster: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
    attempts: u32,
    interval: Duration,
}

impl HealthPoller {
    /// Create a poller with the run's timing constants
    pub fn new(cluster: Arc<dyn ClusterClient>, clock: Arc<dyn Clock>, timing: &Timing) -> Self {
        Self {
            cluster,
            clock,
            attempts: timing.health_attempts,
            interval: timing.health_interval,
        }
    }

    /// Drive the state machine to a terminal state
    ///
    /// Makes at most `attempts` queries with a sleep between attempts, but
    /// not after the final one. Returns [`HealthState::Ready`] on the first
    /// ready answer, [`HealthState::Exhausted`] when the budget is spent.
    pub async fn wait_for_ready(&self, node: &str) -> HealthState {
        info!(node = %node, attempts = self.attempts, "waiting for node to become ready");

        for attempt in 1..=self.attempts {
            match self.cluster.node_ready(node).await {
                Ok(readiness) if readiness.ready => {
                    info!(node = %node, attempt, "node is ready");
                    return HealthState::Ready;
                }
                Ok(readiness) => {
                    debug!(
                        node = %node,
                        status = %readiness.status,
                        attempt,
                        total = self.attempts,
                        "node not ready"
                    );
                }
                Err(e) => {
                    warn!(node = %node, error = %e, attempt, "readiness query failed");
                }
            }

            if attempt < self.attempts {
                self.clock.sleep(self.interval).await;
            }
        }

        error!(node = %node, attempts = self.attempts, "node did not become ready");
        HealthState::Exhausted
    }
}
