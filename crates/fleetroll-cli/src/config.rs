//! Fleet configuration loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use fleetroll_core::config::{HostConfig, Timing};

/// Top-level fleet configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct FleetFile {
    /// Flake reference the host configurations come from
    #[serde(default = "default_flake")]
    pub flake: String,
    /// Timing overrides, in seconds
    #[serde(default)]
    pub timing: TimingFile,
    /// Hosts in rollout order
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostConfig>,
}

fn default_flake() -> String {
    ".".to_string()
}

/// Timing overrides; anything unset keeps its default
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimingFile {
    pub ssh_timeout_secs: Option<u64>,
    pub reboot_grace_secs: Option<u64>,
    pub reboot_poll_interval_secs: Option<u64>,
    pub reboot_wait_max_secs: Option<u64>,
    pub health_interval_secs: Option<u64>,
    pub health_attempts: Option<u32>,
}

impl TimingFile {
    /// Apply the overrides on top of the default timing table
    #[must_use]
    pub fn to_timing(&self) -> Timing {
        let mut timing = Timing::default();
        if let Some(secs) = self.ssh_timeout_secs {
            timing.ssh_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.reboot_grace_secs {
            timing.reboot_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = self.reboot_poll_interval_secs {
            timing.reboot_poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.reboot_wait_max_secs {
            timing.reboot_wait_max = Duration::from_secs(secs);
        }
        if let Some(secs) = self.health_interval_secs {
            timing.health_interval = Duration::from_secs(secs);
        }
        if let Some(attempts) = self.health_attempts {
            timing.health_attempts = attempts;
        }
        timing
    }
}

impl FleetFile {
    /// Load configuration from a file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: FleetFile = toml::from_str(&content)?;
        Ok(file)
    }

    /// Load from the environment variable or the usual paths
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("FLEETROLL_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let paths = [
            PathBuf::from("fleetroll.toml"),
            PathBuf::from("/etc/fleetroll/fleetroll.toml"),
            dirs::config_dir()
                .map(|p| p.join("fleetroll/fleetroll.toml"))
                .unwrap_or_default(),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        eyre::bail!("no fleet configuration found; create fleetroll.toml or set FLEETROLL_CONFIG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            flake = "github:me/infra"

            [timing]
            reboot_wait_max_secs = 600
            health_attempts = 20

            [[host]]
            name = "node-1"
            addr = "node-1.home.arpa"
            flake_attr = "node-1"

            [[host]]
            name = "node-2"
            addr = "10.0.0.2"
            flake_attr = "node-2"
            user = "ops"
        "#;

        let file: FleetFile = toml::from_str(raw).unwrap();

        assert_eq!(file.flake, "github:me/infra");
        assert_eq!(file.hosts.len(), 2);
        assert_eq!(file.hosts[1].user.as_deref(), Some("ops"));

        let timing = file.timing.to_timing();
        assert_eq!(timing.reboot_wait_max, Duration::from_secs(600));
        assert_eq!(timing.health_attempts, 20);
        // Unset fields keep their defaults
        assert_eq!(timing.reboot_grace, Duration::from_secs(30));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let raw = r#"
            [[host]]
            name = "node-1"
            addr = "node-1.home.arpa"
            flake_attr = "node-1"
        "#;

        let file: FleetFile = toml::from_str(raw).unwrap();

        assert_eq!(file.flake, ".");
        assert_eq!(file.timing.to_timing().health_attempts, 12);
    }
}
