//! Environment abstraction for deterministic testing.
//!
//! Decouples the serving loop from the system clock. Under turmoil the clock
//! is virtual, so a stalled server advances simulated time instead of
//! blocking the test process.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use `tokio::time::Instant` driven by turmoil.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// The serving loop awaits this inline for stalled requests, so nothing
    /// else on the loop runs until it completes.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
