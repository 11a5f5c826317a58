//! Configuration deploy and build collaborators
//!
//! The rollout treats deployment as a single external operation; the
//! production implementation drives nixos-rebuild and nix from the
//! operator's machine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use fleetroll_exec::CommandRunner;

use crate::config::HostConfig;
use crate::error::RolloutError;

/// Applies or builds a host's configuration
#[async_trait]
pub trait ConfigDeployer: Send + Sync {
    /// Apply the host's configuration to the host
    async fn apply(&self, host: &HostConfig) -> Result<(), RolloutError>;

    /// Build the host's configuration without deploying it
    async fn build(&self, host: &HostConfig) -> Result<(), RolloutError>;
}

/// Deployer backed by nixos-rebuild and nix
pub struct NixosRebuild {
    runner: Arc<dyn CommandRunner>,
    flake_ref: String,
}

impl NixosRebuild {
    /// Create a deployer for configurations in the given flake
    pub fn new(runner: Arc<dyn CommandRunner>, flake_ref: impl Into<String>) -> Self {
        Self {
            runner,
            flake_ref: flake_ref.into(),
        }
    }

    fn apply_command(&self, host: &HostConfig) -> String {
        // Build on the target itself so the operator's machine does not need
        // to cross-compile
        format!(
            "nixos-rebuild switch --target-host {addr} --flake {flake}#{attr} --no-reexec --build-host {addr} --sudo",
            addr = host.addr,
            flake = self.flake_ref,
            attr = host.flake_attr,
        )
    }

    fn build_command(&self, host: &HostConfig) -> String {
        format!(
            "nix build {flake}#nixosConfigurations.{attr}.config.system.build.toplevel --no-link",
            flake = self.flake_ref,
            attr = host.flake_attr,
        )
    }
}

#[async_trait]
impl ConfigDeployer for NixosRebuild {
    async fn apply(&self, host: &HostConfig) -> Result<(), RolloutError> {
        info!(host = %host.name, addr = %host.addr, "deploying configuration");

        // No timeout: builds legitimately take a long time
        let result = self
            .runner
            .run(&self.apply_command(host))
            .await
            .map_err(|e| RolloutError::DeployFailed(e.to_string()))?;

        if !result.success() {
            return Err(RolloutError::DeployFailed(result.stderr_tail(5)));
        }

        info!(host = %host.name, "deploy succeeded");
        Ok(())
    }

    async fn build(&self, host: &HostConfig) -> Result<(), RolloutError> {
        info!(host = %host.name, attr = %host.flake_attr, "building configuration");

        let result = self
            .runner
            .run(&self.build_command(host))
            .await
            .map_err(|e| RolloutError::BuildFailed(e.to_string()))?;

        if !result.success() {
            return Err(RolloutError::BuildFailed(result.stderr_tail(5)));
        }

        info!(host = %host.name, "build succeeded");
        Ok(())
    }
}
