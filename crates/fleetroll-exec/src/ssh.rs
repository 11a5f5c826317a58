//! Remote command execution through the system OpenSSH client
//!
//! Shelling out to `ssh` keeps the user's own configuration, agent and
//! known_hosts handling in play. `BatchMode=yes` makes sure a missing key
//! fails fast instead of prompting.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandRunner;

/// OpenSSH reserves this exit status for its own failures (connection,
/// handshake, authentication); anything else is the remote command's status.
const SSH_TRANSPORT_STATUS: i32 = 255;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to connect
#[derive(Debug, Clone)]
pub struct SshTarget {
    /// Host address (name or IP)
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Remote user; `None` leaves it to ssh config
    pub user: Option<String>,
}

impl SshTarget {
    /// Create a target for the default port and configured user
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: None,
        }
    }

    /// Set the remote user
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set a custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Command runner that executes on a remote host via `ssh`
#[derive(Debug, Clone)]
pub struct SshRunner {
    target: SshTarget,
    connect_timeout: Duration,
}

impl SshRunner {
    /// Create a runner for the given target
    #[must_use]
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the TCP connect timeout passed to ssh
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Target host address
    #[must_use]
    pub fn host(&self) -> &str {
        &self.target.host
    }

    fn build_args(&self, cmd: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
        ];
        if self.target.port != 22 {
            args.push("-p".to_string());
            args.push(self.target.port.to_string());
        }
        if let Some(ref user) = self.target.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        args.push(self.target.host.clone());
        args.push(cmd.to_string());
        args
    }

    async fn execute(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();
        let args = self.build_args(cmd);

        debug!(host = %self.target.host, command = %cmd, "executing over ssh");

        let output = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if status == SSH_TRANSPORT_STATUS {
            warn!(
                host = %self.target.host,
                stderr = %stderr.trim(),
                "ssh transport failure"
            );
            return Err(ExecError::ConnectionFailed(stderr.trim().to_string()));
        }

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
            duration: start.elapsed(),
        })
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.execute(cmd).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        match timeout(timeout_duration, self.execute(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    host = %self.target.host,
                    command = %cmd,
                    timeout = ?timeout_duration,
                    "ssh command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn runner_type(&self) -> &'static str {
        "ssh"
    }
}
