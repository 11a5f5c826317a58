//! Kernel reboot decision
//!
//! Compares what the host is running against what the deployed configuration
//! will boot. A reboot is required when the kernel version or the kernel
//! parameter set changed. A value that cannot be read contributes "no": a
//! missing signal cannot prove a reboot is needed, it only gets logged for
//! the operator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use fleetroll_exec::CommandRunner;

const RUNNING_KERNEL_CMD: &str = "uname -r";
const PENDING_KERNEL_CMD: &str = "ls /run/current-system/kernel-modules/lib/modules/";
const BOOTED_PARAMS_CMD: &str = "cat /run/booted-system/kernel-params";
const PENDING_PARAMS_CMD: &str = "cat /run/current-system/kernel-params";

/// Point-in-time capture of a host's kernel version and parameter set
///
/// Ephemeral: captured, compared, discarded. Each field is independently
/// obtainable; `None` means the remote read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSnapshot {
    /// Kernel release string
    pub version: Option<String>,
    /// Kernel command-line parameters, order-insensitive
    pub params: Option<BTreeSet<String>>,
}

impl KernelSnapshot {
    /// Parse a whitespace-separated kernel parameter line into a set
    #[must_use]
    pub fn parse_params(raw: &str) -> BTreeSet<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }
}

/// Outcome of comparing the running and pending kernel snapshots
#[derive(Debug, Clone)]
pub struct RebootDecision {
    /// Whether a reboot is required
    pub required: bool,
    /// Human-readable reasons, for logs and the run summary
    pub reasons: Vec<String>,
}

impl RebootDecision {
    /// Compare two snapshots field by field
    ///
    /// Either field differing (with both sides known) requires a reboot. The
    /// parameter symmetric difference is reported but does not change the
    /// boolean beyond set inequality.
    #[must_use]
    pub fn compare(running: &KernelSnapshot, pending: &KernelSnapshot) -> Self {
        let mut reasons = Vec::new();

        if let (Some(run), Some(pend)) = (&running.version, &pending.version)
            && run != pend
        {
            reasons.push(format!("kernel version {run} -> {pend}"));
        }

        if let (Some(booted), Some(next)) = (&running.params, &pending.params)
            && booted != next
        {
            let added: Vec<&str> = next.difference(booted).map(String::as_str).collect();
            let removed: Vec<&str> = booted.difference(next).map(String::as_str).collect();
            reasons.push(format!(
                "kernel params changed (added: [{}], removed: [{}])",
                added.join(" "),
                removed.join(" ")
            ));
        }

        Self {
            required: !reasons.is_empty(),
            reasons,
        }
    }
}

/// Reads kernel state from a host and decides whether it must reboot
pub struct KernelCheck {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl KernelCheck {
    /// Create a check that reads through the given runner
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    async fn read_value(&self, cmd: &str) -> Option<String> {
        match self.runner.run_with_timeout(cmd, self.timeout).await {
            Ok(result) if result.success() => Some(result.stdout_trimmed().to_string()),
            Ok(result) => {
                warn!(
                    command = %cmd,
                    status = result.status,
                    "kernel probe exited nonzero, treating value as unknown"
                );
                None
            }
            Err(e) => {
                warn!(
                    command = %cmd,
                    error = %e,
                    "kernel probe failed, treating value as unknown"
                );
                None
            }
        }
    }

    /// Capture the running kernel version and booted parameter set
    pub async fn running_snapshot(&self) -> KernelSnapshot {
        KernelSnapshot {
            version: self.read_value(RUNNING_KERNEL_CMD).await,
            params: self
                .read_value(BOOTED_PARAMS_CMD)
                .await
                .map(|raw| KernelSnapshot::parse_params(&raw)),
        }
    }

    /// Capture the kernel version and parameter set the deployed
    /// configuration will boot
    pub async fn pending_snapshot(&self) -> KernelSnapshot {
        KernelSnapshot {
            version: self.read_value(PENDING_KERNEL_CMD).await,
            params: self
                .read_value(PENDING_PARAMS_CMD)
                .await
                .map(|raw| KernelSnapshot::parse_params(&raw)),
        }
    }

    /// Decide whether the host needs a reboot
    pub async fn requires_reboot(&self) -> RebootDecision {
        let running = self.running_snapshot().await;
        let pending = self.pending_snapshot().await;

        debug!(?running, ?pending, "captured kernel snapshots");

        RebootDecision::compare(&running, &pending)
    }
}
