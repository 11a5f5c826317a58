//! Cluster readiness queries
//!
//! The rollout only needs one answer from the orchestrator: is this node
//! ready to receive workloads. The production implementation shells out to
//! kubectl; tests implement [`ClusterClient`] directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use fleetroll_exec::CommandRunner;

use crate::error::RolloutError;

/// A node's readiness condition as reported by the cluster
///
/// `ready` is derived from `status`; the raw status string is kept for
/// operator-facing messages ("False", "Unknown", ...).
#[derive(Debug, Clone)]
pub struct NodeReadiness {
    /// Whether the node is ready to receive workloads
    pub ready: bool,
    /// Raw readiness status string
    pub status: String,
}

/// Queries the orchestrator for a node's readiness condition
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch the readiness condition for the named node
    ///
    /// A transport or parse failure is [`RolloutError::QueryFailed`]; a
    /// successful query that reports not-ready is an `Ok` with
    /// `ready == false`.
    async fn node_ready(&self, node: &str) -> Result<NodeReadiness, RolloutError>;
}

/// Cluster client backed by the kubectl binary
pub struct KubectlCluster {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl KubectlCluster {
    /// Create a client that runs kubectl through the given runner
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Extract the `Ready` condition from a node's JSON representation
    fn parse_ready_condition(json: &str) -> Result<NodeReadiness, RolloutError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| RolloutError::QueryFailed(format!("invalid node json: {e}")))?;

        let conditions = value
            .pointer("/status/conditions")
            .and_then(serde_json::Value::as_array);

        if let Some(conditions) = conditions {
            for condition in conditions {
                if condition["type"] == "Ready" {
                    let status = condition["status"].as_str().unwrap_or("Unknown");
                    return Ok(NodeReadiness {
                        ready: status == "True",
                        status: status.to_string(),
                    });
                }
            }
        }

        // A node that has not published conditions yet is simply not ready
        Ok(NodeReadiness {
            ready: false,
            status: "Unknown".to_string(),
        })
    }
}

#[async_trait]
impl ClusterClient for KubectlCluster {
    async fn node_ready(&self, node: &str) -> Result<NodeReadiness, RolloutError> {
        let cmd = format!("kubectl get node {node} -o json");

        let result = self
            .runner
            .run_with_timeout(&cmd, self.timeout)
            .await
            .map_err(|e| RolloutError::QueryFailed(e.to_string()))?;

        if !result.success() {
            return Err(RolloutError::QueryFailed(result.stderr_tail(3)));
        }

        let readiness = Self::parse_ready_condition(&result.stdout)?;
        debug!(node = %node, status = %readiness.status, "queried node readiness");
        Ok(readiness)
    }
}
