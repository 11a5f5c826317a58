//! fleetroll-core: sequential rolling-update logic
//!
//! Contains the per-host rollout state machine, the kernel reboot decision,
//! the recovery and cluster-health pollers and the fleet orchestrator that
//! drives them one host at a time.

pub mod clock;
pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fleet;
pub mod health;
pub mod kernel;
pub mod recovery;
pub mod report;
pub mod rollout;
pub mod state;

pub use clock::{Clock, TokioClock};
pub use cluster::{ClusterClient, KubectlCluster, NodeReadiness};
pub use config::{HostConfig, RebootPolicy, RolloutConfig, RolloutMode, Timing, select_hosts};
pub use deploy::{ConfigDeployer, NixosRebuild};
pub use error::RolloutError;
pub use fleet::{FleetOrchestrator, RunnerFactory, SshRunnerFactory};
pub use health::HealthPoller;
pub use kernel::{KernelCheck, KernelSnapshot, RebootDecision};
pub use recovery::RecoveryPoller;
pub use report::{FleetSummary, RolloutOutcome};
pub use rollout::HostRollout;
pub use state::{HealthState, RecoveryState, RolloutStage};
