//! Per-host outcomes and the fleet-level run summary

use chrono::{DateTime, Utc};

use crate::state::RolloutStage;

/// Result of one host's rollout
#[derive(Debug, Clone)]
pub struct RolloutOutcome {
    /// Host name
    pub host: String,
    /// Whether every stage passed
    pub succeeded: bool,
    /// Last stage reached (the failing stage, or the final stage on success)
    pub stage: RolloutStage,
    /// Failure detail, for the operator to resume from
    pub detail: Option<String>,
}

impl RolloutOutcome {
    /// Successful outcome that completed at `stage`
    #[must_use]
    pub fn success(host: impl Into<String>, stage: RolloutStage) -> Self {
        Self {
            host: host.into(),
            succeeded: true,
            stage,
            detail: None,
        }
    }

    /// Failed outcome at `stage` with an operator-facing detail
    #[must_use]
    pub fn failure(host: impl Into<String>, stage: RolloutStage, detail: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            succeeded: false,
            stage,
            detail: Some(detail.into()),
        }
    }
}

/// Ordered per-host outcomes plus the first-failure marker
#[derive(Debug, Clone)]
pub struct FleetSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Outcomes in processing order; hosts after a failure never appear
    pub outcomes: Vec<RolloutOutcome>,
    /// Name of the first host that failed, if any
    pub failed: Option<String>,
}

impl FleetSummary {
    /// Empty summary stamped with the current time
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            outcomes: Vec::new(),
            failed: None,
        }
    }

    /// Record a host outcome, marking the run failed on the first failure
    pub fn record(&mut self, outcome: RolloutOutcome) {
        if !outcome.succeeded && self.failed.is_none() {
            self.failed = Some(outcome.host.clone());
        }
        self.outcomes.push(outcome);
    }

    /// Whether every processed host succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_none()
    }

    /// Names of the hosts that succeeded, in processing order
    #[must_use]
    pub fn succeeded_hosts(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded)
            .map(|o| o.host.as_str())
            .collect()
    }

    /// The failed host's outcome, if the run failed
    #[must_use]
    pub fn failed_outcome(&self) -> Option<&RolloutOutcome> {
        self.outcomes.iter().find(|o| !o.succeeded)
    }
}

impl Default for FleetSummary {
    fn default() -> Self {
        Self::new()
    }
}
