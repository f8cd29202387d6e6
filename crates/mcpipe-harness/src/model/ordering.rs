//! Release-order model.

use mcpipe_core::OrderingMode;

use crate::model::ModelOp;

/// Expected release order of replies on one server.
///
/// Rules, per arriving request:
///
/// - hold: waits.
/// - in-order, anything else: released at once if nothing is waiting,
///   otherwise waits behind the earlier replies.
/// - out-of-order, anything else: released at once.
/// - flush: after its own reply is placed, everything waiting is released
///   oldest first.
#[derive(Debug, Clone)]
pub struct OrderingModel {
    ordering: OrderingMode,
    waiting: Vec<u32>,
    released: Vec<u32>,
}

impl OrderingModel {
    /// Empty model for `ordering`.
    #[must_use]
    pub fn new(ordering: OrderingMode) -> Self {
        Self { ordering, waiting: Vec::new(), released: Vec::new() }
    }

    /// Apply request `id` performing `op`. Returns the ids released by it,
    /// in release order.
    pub fn apply(&mut self, id: u32, op: ModelOp) -> Vec<u32> {
        let before = self.released.len();

        if op.is_hold() {
            self.waiting.push(id);
        } else {
            let must_wait = self.ordering == OrderingMode::InOrder && !self.waiting.is_empty();
            if must_wait {
                self.waiting.push(id);
            } else {
                self.released.push(id);
            }
        }

        if op.is_flush() {
            self.released.append(&mut self.waiting);
        }

        self.released[before..].to_vec()
    }

    /// Every id released so far, in release order.
    #[must_use]
    pub fn released(&self) -> &[u32] {
        &self.released
    }

    /// Ids still waiting, oldest first.
    #[must_use]
    pub fn waiting(&self) -> &[u32] {
        &self.waiting
    }
}
