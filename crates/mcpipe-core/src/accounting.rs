//! Client-side request accounting.
//!
//! Every client request is in exactly one of two phases: pending (submitted,
//! not yet written) or in-flight (written, reply not yet received). The
//! transport reports each phase change as a [`StatusDelta`] and
//! [`AccountingState`] folds them into counters.
//!
//! # Invariants
//!
//! - A delta's two components always differ. Both counters moving by the
//!   same amount, including the empty `(0, 0)` delta, is rejected.
//! - Neither counter goes negative. A rejected delta leaves state unchanged.

use thiserror::Error;

/// Signed change to the pending and in-flight counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDelta {
    /// Change in pending requests
    pub pending: i32,
    /// Change in in-flight requests
    pub inflight: i32,
}

impl StatusDelta {
    /// Request submitted.
    pub const SUBMITTED: Self = Self::new(1, 0);
    /// Request written to the connection.
    pub const WRITTEN: Self = Self::new(-1, 1);
    /// Reply received for a written request.
    pub const REPLIED: Self = Self::new(0, -1);
    /// Request timed out or failed before it was written.
    pub const ABANDONED_PENDING: Self = Self::new(-1, 0);
    /// Request timed out or failed after it was written.
    pub const ABANDONED_INFLIGHT: Self = Self::new(0, -1);

    /// Construct a delta.
    #[must_use]
    pub const fn new(pending: i32, inflight: i32) -> Self {
        Self { pending, inflight }
    }
}

/// Rejected [`StatusDelta`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingViolation {
    /// Both counters moved in the same direction at once
    #[error("simultaneous transition: pending {pending:+}, inflight {inflight:+}")]
    SimultaneousTransition {
        /// Pending change
        pending: i32,
        /// In-flight change
        inflight: i32,
    },

    /// A counter would have gone negative
    #[error("negative count: {counter} would drop below zero (delta {delta:+}, current {current})")]
    NegativeCount {
        /// Which counter
        counter: &'static str,
        /// Offending change
        delta: i32,
        /// Value before the change
        current: usize,
    },
}

/// Pending and in-flight counters with their high-water marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountingState {
    pending: usize,
    inflight: usize,
    pending_max: usize,
    inflight_max: usize,
}

impl AccountingState {
    /// All counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the counters.
    ///
    /// # Errors
    ///
    /// - [`AccountingViolation::SimultaneousTransition`] if both components
    ///   are equal, `(0, 0)` included
    /// - [`AccountingViolation::NegativeCount`] if either counter would drop
    ///   below zero
    pub fn apply(&mut self, delta: StatusDelta) -> Result<(), AccountingViolation> {
        if delta.pending == delta.inflight {
            return Err(AccountingViolation::SimultaneousTransition {
                pending: delta.pending,
                inflight: delta.inflight,
            });
        }

        let pending = shifted("pending", self.pending, delta.pending)?;
        let inflight = shifted("inflight", self.inflight, delta.inflight)?;

        self.pending = pending;
        self.inflight = inflight;
        self.pending_max = self.pending_max.max(pending);
        self.inflight_max = self.inflight_max.max(inflight);
        Ok(())
    }

    /// Submitted requests not yet written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Written requests without a reply.
    #[must_use]
    pub fn inflight(&self) -> usize {
        self.inflight
    }

    /// Highest pending count seen.
    #[must_use]
    pub fn pending_max(&self) -> usize {
        self.pending_max
    }

    /// Highest in-flight count seen.
    #[must_use]
    pub fn inflight_max(&self) -> usize {
        self.inflight_max
    }

    /// Both counters at zero.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.inflight == 0
    }
}

fn shifted(counter: &'static str, current: usize, delta: i32) -> Result<usize, AccountingViolation> {
    isize::try_from(delta)
        .ok()
        .and_then(|delta| current.checked_add_signed(delta))
        .ok_or(AccountingViolation::NegativeCount { counter, delta, current })
}
