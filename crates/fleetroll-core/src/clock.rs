//! Injectable sleep capability
//!
//! Polling loops take a [`Clock`] so tests can simulate waiting without real
//! delays.

use std::time::Duration;

use async_trait::async_trait;

/// Sleep capability used by the pollers
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
