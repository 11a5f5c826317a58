//! Host recovery poller
//!
//! After a reboot is triggered the host first has to go down, so polling
//! starts only after a grace period. From then on a lightweight probe runs at
//! a fixed interval until the host answers or the wait ceiling is reached.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use fleetroll_exec::CommandRunner;

use crate::clock::Clock;
use crate::config::Timing;
use crate::state::RecoveryState;

/// Minimal remote command used solely to test connectivity
pub const PROBE_COMMAND: &str = "echo ok";

/// Run the reachability probe through the given runner
///
/// Success means the transport worked, the command exited zero and the
/// expected marker came back on stdout.
pub async fn probe_host(runner: &dyn CommandRunner, timeout: Duration) -> bool {
    match runner.run_with_timeout(PROBE_COMMAND, timeout).await {
        Ok(result) => result.success() && result.stdout.contains("ok"),
        Err(e) => {
            debug!(error = %e, "reachability probe failed");
            false
        }
    }
}

/// Waits for a rebooted host to come back online
pub struct RecoveryPoller {
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
    grace: Duration,
    interval: Duration,
    max_wait: Duration,
    probe_timeout: Duration,
}

impl RecoveryPoller {
    /// Create a poller with the run's timing constants
    pub fn new(runner: Arc<dyn CommandRunner>, clock: Arc<dyn Clock>, timing: &Timing) -> Self {
        Self {
            runner,
            clock,
            grace: timing.reboot_grace,
            interval: timing.reboot_poll_interval,
            max_wait: timing.reboot_wait_max,
            probe_timeout: timing.command_timeout(),
        }
    }

    /// Drive the state machine to a terminal state
    ///
    /// Returns [`RecoveryState::Online`] on the first successful probe or
    /// [`RecoveryState::TimedOut`] once the accumulated wait reaches the
    /// ceiling.
    pub async fn wait_for_host(&self, host: &str) -> RecoveryState {
        let mut state = RecoveryState::WaitingGrace;
        let mut elapsed = Duration::ZERO;

        loop {
            state = match state {
                RecoveryState::WaitingGrace => {
                    info!(host = %host, grace = ?self.grace, "waiting for host to start rebooting");
                    self.clock.sleep(self.grace).await;
                    elapsed += self.grace;
                    RecoveryState::Polling
                }
                RecoveryState::Polling => {
                    if elapsed >= self.max_wait {
                        error!(
                            host = %host,
                            waited = ?elapsed,
                            "host did not come back online"
                        );
                        RecoveryState::TimedOut
                    } else if probe_host(self.runner.as_ref(), self.probe_timeout).await {
                        info!(host = %host, waited = ?elapsed, "host is back online");
                        RecoveryState::Online
                    } else {
                        debug!(host = %host, waited = ?elapsed, "host not reachable yet");
                        self.clock.sleep(self.interval).await;
                        elapsed += self.interval;
                        RecoveryState::Polling
                    }
                }
                terminal => return terminal,
            };
        }
    }
}
