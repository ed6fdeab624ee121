//! # Time source for loop wake-ups.
//!
//! Loops never read ambient time directly; they go through a [`Clock`] so that
//! tests and embedders can substitute their own. [`TokioClock`] is backed by
//! `tokio::time` and therefore honours `tokio::time::pause()` /
//! `#[tokio::test(start_paused = true)]` as a virtual clock.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

/// Source of "now" and deferred wake-ups.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Completes once `deadline` has been reached.
    async fn sleep_until(&self, deadline: Instant);
}

/// Shared handle to a clock.
pub type ClockRef = Arc<dyn Clock>;

/// Clock backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}
