//! Per-host rollout state machine
//!
//! Sequences reachability check, deploy, reboot decision, recovery wait and
//! cluster-health wait for one host, short-circuiting on the first failure.
//! Dry-run swaps the mutating stages for a read-only readiness check and a
//! build-without-deploy.

use std::sync::Arc;

use tracing::{debug, info, warn};

use fleetroll_exec::CommandRunner;

use crate::clock::Clock;
use crate::cluster::ClusterClient;
use crate::config::{HostConfig, RebootPolicy, RolloutConfig, RolloutMode};
use crate::deploy::ConfigDeployer;
use crate::error::RolloutError;
use crate::health::HealthPoller;
use crate::kernel::KernelCheck;
use crate::recovery::{RecoveryPoller, probe_host};
use crate::report::RolloutOutcome;
use crate::state::{HealthState, RecoveryState, RolloutStage};

const REBOOT_COMMAND: &str = "sudo systemctl reboot";

/// Drives one host through its rollout
pub struct HostRollout<'a> {
    host: &'a HostConfig,
    runner: Arc<dyn CommandRunner>,
    deployer: Arc<dyn ConfigDeployer>,
    cluster: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
    config: &'a RolloutConfig,
}

impl<'a> HostRollout<'a> {
    /// Create a rollout for one host with the run's collaborators
    pub fn new(
        host: &'a HostConfig,
        runner: Arc<dyn CommandRunner>,
        deployer: Arc<dyn ConfigDeployer>,
        cluster: Arc<dyn ClusterClient>,
        clock: Arc<dyn Clock>,
        config: &'a RolloutConfig,
    ) -> Self {
        Self {
            host,
            runner,
            deployer,
            cluster,
            clock,
            config,
        }
    }

    /// Run every stage, producing this host's outcome
    pub async fn run(&self) -> RolloutOutcome {
        let result = match self.config.mode {
            RolloutMode::Deploy => self.run_deploy().await,
            RolloutMode::DryRun => self.run_dry_run().await,
        };

        match result {
            Ok(stage) => {
                info!(host = %self.host.name, "host rollout succeeded");
                RolloutOutcome::success(&self.host.name, stage)
            }
            Err((stage, e)) => {
                warn!(
                    host = %self.host.name,
                    stage = %stage,
                    error = %e,
                    "host rollout failed"
                );
                RolloutOutcome::failure(&self.host.name, stage, e.to_string())
            }
        }
    }

    async fn run_deploy(&self) -> Result<RolloutStage, (RolloutStage, RolloutError)> {
        self.check_reachable()
            .await
            .map_err(|e| (RolloutStage::CheckReachable, e))?;

        self.deployer
            .apply(self.host)
            .await
            .map_err(|e| (RolloutStage::Deploy, e))?;

        if self.decide_reboot().await {
            self.reboot_and_wait()
                .await
                .map_err(|e| (RolloutStage::Reboot, e))?;
        }

        self.await_cluster_health()
            .await
            .map_err(|e| (RolloutStage::AwaitClusterHealth, e))?;

        Ok(RolloutStage::AwaitClusterHealth)
    }

    /// Read-only path: probe, readiness check, build without deploy
    async fn run_dry_run(&self) -> Result<RolloutStage, (RolloutStage, RolloutError)> {
        self.check_reachable()
            .await
            .map_err(|e| (RolloutStage::CheckReachable, e))?;

        self.check_cluster_once()
            .await
            .map_err(|e| (RolloutStage::AwaitClusterHealth, e))?;

        self.deployer
            .build(self.host)
            .await
            .map_err(|e| (RolloutStage::BuildOnly, e))?;

        Ok(RolloutStage::BuildOnly)
    }

    async fn check_reachable(&self) -> Result<(), RolloutError> {
        info!(
            host = %self.host.name,
            stage = %RolloutStage::CheckReachable,
            "checking reachability"
        );

        if probe_host(self.runner.as_ref(), self.config.timing.command_timeout()).await {
            Ok(())
        } else {
            Err(RolloutError::Unreachable(format!(
                "{} did not answer the reachability probe",
                self.host.addr
            )))
        }
    }

    /// Apply the reboot policy; only `Auto` consults the kernel decision
    async fn decide_reboot(&self) -> bool {
        match self.config.reboot_policy {
            RebootPolicy::Suppressed => {
                info!(host = %self.host.name, "reboot suppressed by policy");
                false
            }
            RebootPolicy::Forced => {
                info!(host = %self.host.name, "reboot forced by policy");
                true
            }
            RebootPolicy::Auto => {
                info!(
                    host = %self.host.name,
                    stage = %RolloutStage::DecideReboot,
                    "checking whether a reboot is required"
                );

                let check = KernelCheck::new(
                    self.runner.clone(),
                    self.config.timing.command_timeout(),
                );
                let decision = check.requires_reboot().await;

                if decision.required {
                    for reason in &decision.reasons {
                        info!(host = %self.host.name, reason = %reason, "reboot required");
                    }
                } else {
                    info!(host = %self.host.name, "no reboot needed");
                }

                decision.required
            }
        }
    }

    async fn reboot_and_wait(&self) -> Result<(), RolloutError> {
        self.trigger_reboot().await;

        let poller =
            RecoveryPoller::new(self.runner.clone(), self.clock.clone(), &self.config.timing);

        match poller.wait_for_host(&self.host.name).await {
            RecoveryState::Online => Ok(()),
            _ => Err(RolloutError::RebootTimeout {
                waited: self.config.timing.reboot_wait_max,
            }),
        }
    }

    /// Fire-and-forget reboot trigger
    ///
    /// The connection dropping mid-command is the normal case here, so
    /// transport failures are swallowed; only the recovery poller decides
    /// whether the reboot actually failed.
    async fn trigger_reboot(&self) {
        info!(
            host = %self.host.name,
            stage = %RolloutStage::Reboot,
            "triggering reboot"
        );

        match self
            .runner
            .run_with_timeout(REBOOT_COMMAND, self.config.timing.command_timeout())
            .await
        {
            Ok(result) if !result.success() => {
                warn!(
                    host = %self.host.name,
                    status = result.status,
                    stderr = %result.stderr_tail(3),
                    "reboot command exited nonzero"
                );
            }
            Ok(_) => {}
            Err(e) if e.is_connection_failure() => {
                debug!(
                    host = %self.host.name,
                    error = %e,
                    "connection dropped during reboot command"
                );
            }
            Err(e) => {
                warn!(host = %self.host.name, error = %e, "reboot command failed");
            }
        }
    }

    async fn await_cluster_health(&self) -> Result<(), RolloutError> {
        info!(
            host = %self.host.name,
            stage = %RolloutStage::AwaitClusterHealth,
            "waiting for cluster health"
        );

        let poller =
            HealthPoller::new(self.cluster.clone(), self.clock.clone(), &self.config.timing);

        match poller.wait_for_ready(&self.host.name).await {
            HealthState::Ready => Ok(()),
            _ => Err(RolloutError::HealthExhausted {
                attempts: self.config.timing.health_attempts,
            }),
        }
    }

    /// Single read-only readiness check, used by dry-run
    async fn check_cluster_once(&self) -> Result<(), RolloutError> {
        let readiness = self.cluster.node_ready(&self.host.name).await?;

        if readiness.ready {
            info!(host = %self.host.name, "node is healthy");
            Ok(())
        } else {
            Err(RolloutError::NodeNotReady {
                node: self.host.name.clone(),
                status: readiness.status,
            })
        }
    }
}
