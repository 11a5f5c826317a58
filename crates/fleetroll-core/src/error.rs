//! Error types for fleetroll-core

use std::time::Duration;

use thiserror::Error;

/// Errors that can fail a host's rollout, plus startup configuration errors
///
/// All variants except [`RolloutError::Config`] are scoped to a single host;
/// `Config` aborts the run before any host is touched.
#[derive(Error, Debug, Clone)]
pub enum RolloutError {
    /// Host did not answer the reachability probe
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Configuration deploy reported failure
    #[error("deploy failed: {0}")]
    DeployFailed(String),

    /// Build-only check reported failure
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// Host did not come back online after a reboot
    #[error("host did not come back online within {waited:?}")]
    RebootTimeout {
        /// Total time waited since the reboot was triggered
        waited: Duration,
    },

    /// Node did not report ready within the attempt budget
    #[error("node not ready after {attempts} attempts")]
    HealthExhausted {
        /// Number of readiness queries made
        attempts: u32,
    },

    /// Node readiness was queried once and reported not-ready
    #[error("node {node} is not ready: {status}")]
    NodeNotReady {
        /// Node name as known to the cluster
        node: String,
        /// Reported readiness status
        status: String,
    },

    /// Cluster query transport failure, distinct from a not-ready answer
    #[error("cluster query failed: {0}")]
    QueryFailed(String),

    /// Invalid startup configuration
    #[error("configuration error: {0}")]
    Config(String),
}
