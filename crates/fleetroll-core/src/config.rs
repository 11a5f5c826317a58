//! Configuration types for hosts and rollout runs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RolloutError;

/// Configuration for a single host in the fleet
///
/// Immutable once the fleet list is constructed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique hostname identifier (also the cluster node name)
    pub name: String,
    /// Address used for SSH and deployment
    pub addr: String,
    /// Flake attribute naming which configuration to apply
    pub flake_attr: String,
    /// SSH user; `None` leaves it to ssh config
    pub user: Option<String>,
}

/// What kind of run this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutMode {
    /// Apply configuration and reboot where required
    Deploy,
    /// Read-only verification plus a build-without-deploy check
    DryRun,
}

/// Whether the kernel reboot decision is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootPolicy {
    /// Reboot when the kernel decision says so
    Auto,
    /// Reboot every host, decision not consulted
    Forced,
    /// Never reboot, even when a kernel change is detected
    Suppressed,
}

/// Timing constants for probes and polling loops
#[derive(Debug, Clone)]
pub struct Timing {
    /// TCP connect timeout for SSH
    pub ssh_timeout: Duration,
    /// Delay after triggering a reboot before polling starts
    pub reboot_grace: Duration,
    /// Interval between reachability probes after a reboot
    pub reboot_poll_interval: Duration,
    /// Ceiling on total wait for a host to come back
    pub reboot_wait_max: Duration,
    /// Interval between cluster readiness queries
    pub health_interval: Duration,
    /// Number of cluster readiness queries before giving up
    pub health_attempts: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            ssh_timeout: Duration::from_secs(10),
            reboot_grace: Duration::from_secs(30),
            reboot_poll_interval: Duration::from_secs(10),
            reboot_wait_max: Duration::from_secs(300),
            health_interval: Duration::from_secs(10),
            health_attempts: 12,
        }
    }
}

impl Timing {
    /// Overall cap on a short remote read: connect timeout plus slack for the
    /// command itself
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.ssh_timeout + Duration::from_secs(5)
    }
}

/// Settings fixed for an entire rollout run
#[derive(Debug, Clone)]
pub struct RolloutConfig {
    /// Deploy or dry-run
    pub mode: RolloutMode,
    /// Reboot policy for every host in the run
    pub reboot_policy: RebootPolicy,
    /// Timing constants
    pub timing: Timing,
}

/// Restrict the fleet to the named subset, preserving configured order
///
/// An empty `names` slice selects the whole fleet. A filter that matches
/// nothing is a startup error, since a run over zero hosts is always a
/// mistake.
pub fn select_hosts(
    fleet: &[HostConfig],
    names: &[String],
) -> Result<Vec<HostConfig>, RolloutError> {
    if names.is_empty() {
        return Ok(fleet.to_vec());
    }

    let selected: Vec<HostConfig> = fleet
        .iter()
        .filter(|h| names.contains(&h.name))
        .cloned()
        .collect();

    if selected.is_empty() {
        let available: Vec<&str> = fleet.iter().map(|h| h.name.as_str()).collect();
        return Err(RolloutError::Config(format!(
            "no hosts match {:?}; available hosts: {}",
            names,
            available.join(", ")
        )));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Vec<HostConfig> {
        ["node-1", "node-2", "node-3"]
            .iter()
            .map(|name| HostConfig {
                name: (*name).to_string(),
                addr: format!("{name}.home.arpa"),
                flake_attr: (*name).to_string(),
                user: None,
            })
            .collect()
    }

    #[test]
    fn test_empty_filter_selects_all() {
        let selected = select_hosts(&fleet(), &[]).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_filter_preserves_configured_order() {
        let names = vec!["node-3".to_string(), "node-1".to_string()];
        let selected = select_hosts(&fleet(), &names).unwrap();

        let selected_names: Vec<&str> = selected.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(selected_names, vec!["node-1", "node-3"]);
    }

    #[test]
    fn test_filter_matching_nothing_is_an_error() {
        let names = vec!["nope".to_string()];
        let err = select_hosts(&fleet(), &names).unwrap_err();

        assert!(matches!(err, RolloutError::Config(_)));
        assert!(err.to_string().contains("node-1"));
    }

    #[test]
    fn test_default_timing_matches_constants() {
        let timing = Timing::default();

        assert_eq!(timing.ssh_timeout, Duration::from_secs(10));
        assert_eq!(timing.reboot_grace, Duration::from_secs(30));
        assert_eq!(timing.reboot_wait_max, Duration::from_secs(300));
        assert_eq!(timing.health_attempts, 12);
        assert_eq!(timing.command_timeout(), Duration::from_secs(15));
    }
}
