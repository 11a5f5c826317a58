//! State machine types for rollout, recovery and health polling

use std::fmt;

/// Stages of a single host's rollout, in execution order
///
/// Deploy mode runs `CheckReachable`, `Deploy`, `DecideReboot`, `Reboot`
/// (when required) and `AwaitClusterHealth`. Dry-run replaces the mutating
/// stages with a read-only readiness check and `BuildOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutStage {
    CheckReachable,
    Deploy,
    BuildOnly,
    DecideReboot,
    Reboot,
    AwaitClusterHealth,
}

impl fmt::Display for RolloutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RolloutStage::CheckReachable => "check-reachable",
            RolloutStage::Deploy => "deploy",
            RolloutStage::BuildOnly => "build-only",
            RolloutStage::DecideReboot => "decide-reboot",
            RolloutStage::Reboot => "reboot",
            RolloutStage::AwaitClusterHealth => "await-cluster-health",
        };
        f.write_str(name)
    }
}

/// States of the host recovery poller
///
/// `WaitingGrace` and `Polling` are transient; `Online` and `TimedOut` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    WaitingGrace,
    Polling,
    Online,
    TimedOut,
}

/// States of the cluster health poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Polling,
    Ready,
    Exhausted,
}
