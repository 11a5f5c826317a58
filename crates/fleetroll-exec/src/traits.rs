//! Command runner trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs shell commands, locally or on a remote host
///
/// Implementations do not retry; retry and backoff policy belongs to callers.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and wait for it to complete
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with [`ExecError::Timeout`] if it does not
    /// complete within `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Short identifier for logging ("local", "ssh", ...)
    fn runner_type(&self) -> &'static str;
}
