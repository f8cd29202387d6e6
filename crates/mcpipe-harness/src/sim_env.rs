//! Simulation environment on turmoil's virtual clock.

use std::time::Duration;

use mcpipe_core::Environment;

/// Environment for code running inside a turmoil host.
///
/// Turmoil drives tokio's clock, so `now()` and `sleep()` are virtual. A
/// `sleep` request stalling the serving loop costs no wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimEnv;

impl SimEnv {
    /// Create a simulation environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
