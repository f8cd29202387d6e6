//! Fuzz target for the request handler's ordering discipline
//!
//! # Invariants
//!
//! - Replies are released exactly when and in the order the reference model
//!   releases them
//! - Every request is answered at most once
//! - A trailing flush leaves nothing queued

#![no_main]

use std::{collections::HashSet, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mcpipe_core::{CompletionContext, HandlerAction, OrderingMode, RequestHandler};
use mcpipe_harness::{ModelOp, OrderingModel};
use mcpipe_proto::FrameFlags;

#[derive(Debug, Arbitrary)]
struct Input {
    in_order: bool,
    ops: Vec<ModelOp>,
}

fuzz_target!(|input: Input| {
    let ordering = if input.in_order { OrderingMode::InOrder } else { OrderingMode::OutOfOrder };
    let mut handler = RequestHandler::new(ordering, Duration::ZERO);
    let mut model = OrderingModel::new(ordering);
    let mut answered = HashSet::new();

    let trailing = [ModelOp::Flush];
    for (index, op) in input.ops.iter().chain(trailing.iter()).enumerate() {
        let id = index as u32 + 1;
        let actions = handler.handle(CompletionContext::new(1, id, FrameFlags::empty()), op.request());

        let released: Vec<u32> = actions
            .iter()
            .filter_map(|action| match action {
                HandlerAction::Send { context, .. } => Some(context.request_id()),
                _ => None,
            })
            .collect();

        assert_eq!(released, model.apply(id, *op), "divergence at {index}: {op:?}");
        for id in released {
            assert!(answered.insert(id), "request {id} answered twice");
        }
    }

    assert_eq!(handler.queued(), 0);
    assert!(model.waiting().is_empty());
});
