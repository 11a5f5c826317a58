//! Fleet orchestrator
//!
//! Runs the per-host rollout across the configured host list, strictly in
//! order and one host at a time. The first host failure stops the run; the
//! remaining hosts are left untouched for the operator.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use fleetroll_exec::{CommandRunner, SshRunner, SshTarget};

use crate::clock::Clock;
use crate::cluster::ClusterClient;
use crate::config::{HostConfig, RolloutConfig};
use crate::deploy::ConfigDeployer;
use crate::report::FleetSummary;
use crate::rollout::HostRollout;

/// Creates the command runner that executes on a given host
///
/// Lets tests substitute scripted runners per host.
pub trait RunnerFactory: Send + Sync {
    /// Runner for commands on `host`
    fn runner_for(&self, host: &HostConfig) -> Arc<dyn CommandRunner>;
}

/// Production factory creating one [`SshRunner`] per host
pub struct SshRunnerFactory {
    connect_timeout: Duration,
}

impl SshRunnerFactory {
    /// Create a factory using the given TCP connect timeout
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl RunnerFactory for SshRunnerFactory {
    fn runner_for(&self, host: &HostConfig) -> Arc<dyn CommandRunner> {
        let mut target = SshTarget::new(host.addr.clone());
        if let Some(ref user) = host.user {
            target = target.with_user(user.clone());
        }
        Arc::new(SshRunner::new(target).with_connect_timeout(self.connect_timeout))
    }
}

/// Runs the rollout across the whole fleet
pub struct FleetOrchestrator {
    hosts: Vec<HostConfig>,
    config: RolloutConfig,
    factory: Arc<dyn RunnerFactory>,
    deployer: Arc<dyn ConfigDeployer>,
    cluster: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
}

impl FleetOrchestrator {
    /// Create an orchestrator over an already-selected host list
    pub fn new(
        hosts: Vec<HostConfig>,
        config: RolloutConfig,
        factory: Arc<dyn RunnerFactory>,
        deployer: Arc<dyn ConfigDeployer>,
        cluster: Arc<dyn ClusterClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hosts,
            config,
            factory,
            deployer,
            cluster,
            clock,
        }
    }

    /// Process every host in order, stopping at the first failure
    pub async fn run(&self) -> FleetSummary {
        let mut summary = FleetSummary::new();

        info!(
            hosts = self.hosts.len(),
            mode = ?self.config.mode,
            reboot_policy = ?self.config.reboot_policy,
            "starting rollout"
        );

        for host in &self.hosts {
            info!(host = %host.name, addr = %host.addr, "processing host");

            let runner = self.factory.runner_for(host);
            let rollout = HostRollout::new(
                host,
                runner,
                self.deployer.clone(),
                self.cluster.clone(),
                self.clock.clone(),
                &self.config,
            );

            let outcome = rollout.run().await;
            let failed = !outcome.succeeded;
            summary.record(outcome);

            if failed {
                error!(
                    host = %host.name,
                    "host failed, stopping rollout; later hosts were not attempted"
                );
                break;
            }
        }

        info!(
            processed = summary.outcomes.len(),
            succeeded = summary.succeeded_hosts().len(),
            failed = ?summary.failed,
            "rollout finished"
        );

        summary
    }
}
