//! Error types for fleetroll-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while executing a command
///
/// A command that runs and exits nonzero is not an error at this layer; it is
/// reported through [`crate::result::CommandResult::status`]. These variants
/// cover the cases where no exit status could be obtained at all.
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Transport-level failure before the command could run
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Command did not complete within the allowed time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ExecError {
    /// Whether this error means the host could not be reached at all
    ///
    /// Connection failures and timeouts are transport-level; callers that only
    /// care about reachability treat these differently from a command that ran
    /// and failed.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Timeout { .. }
        )
    }
}
