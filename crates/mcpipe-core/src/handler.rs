//! Server-side request handling.
//!
//! [`RequestHandler`] is Sans-IO: it classifies a request, decides whether
//! its reply goes out now, waits in the queue, or is held, and returns the
//! resulting [`HandlerAction`]s. The serving loop executes them in order.
//!
//! # Ordering discipline
//!
//! - Out-of-order: a submitted reply is sent immediately and never touches
//!   the queue.
//! - In-order: a submitted reply is queued; when it is the only entry the
//!   queue is flushed at once, otherwise it waits behind an earlier entry
//!   until something flushes.
//!
//! Held replies bypass the discipline and always queue. In in-order mode a
//! hold therefore stalls every later reply until a `flush` or `shutdown`.

use std::time::Duration;

use bytes::Bytes;
use mcpipe_proto::{FrameHeader, Operation, Reply, ReplyStatus, Request};

use crate::{
    classifier::{Behavior, classify},
    config::{OrderingMode, ServerConfig},
    contract::FILLER,
    reply_queue::{CompletionContext, ReplyQueue},
};

/// Work for the serving loop, executed in the order returned.
#[derive(Debug)]
pub enum HandlerAction {
    /// Block the serving loop for this long. Must be awaited inline.
    Stall(Duration),
    /// Raise the shutdown flag.
    Shutdown,
    /// Write `reply` to the context's connection.
    Send {
        /// Who to answer
        context: CompletionContext,
        /// What to answer with
        reply: Reply,
    },
}

/// Request classifier plus reply ordering engine.
#[derive(Debug)]
pub struct RequestHandler {
    ordering: OrderingMode,
    stall: Duration,
    queue: ReplyQueue,
}

impl RequestHandler {
    /// Create a handler with the given discipline and stall duration.
    #[must_use]
    pub fn new(ordering: OrderingMode, stall: Duration) -> Self {
        Self { ordering, stall, queue: ReplyQueue::new() }
    }

    /// Create a handler from server configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.ordering, config.stall_duration)
    }

    /// Handle one request, returning the actions it produces.
    pub fn handle(&mut self, context: CompletionContext, request: Request) -> Vec<HandlerAction> {
        let mut actions = Vec::new();

        if request.operation == Operation::Set {
            tracing::debug!(key = %request.key, request_id = context.request_id(), "set");
            self.submit(context, Reply::status(ReplyStatus::Stored), &mut actions);
            return actions;
        }

        let behavior = classify(&request.key);
        tracing::debug!(
            key = %request.key,
            request_id = context.request_id(),
            ?behavior,
            "get"
        );

        match behavior {
            Behavior::Delay => {
                actions.push(HandlerAction::Stall(self.stall));
                self.submit(context, Reply::status(ReplyStatus::NotFound), &mut actions);
            },
            Behavior::Shutdown => {
                actions.push(HandlerAction::Shutdown);
                self.submit(context, Reply::status(ReplyStatus::NotFound), &mut actions);
                self.flush(&mut actions);
            },
            Behavior::Hold => {
                let reply = Reply::found(request.key.clone(), request.key);
                self.queue.push(context, reply);
            },
            Behavior::FlushNow => {
                let reply = Reply::found(request.key.clone(), request.key);
                self.submit(context, reply, &mut actions);
                self.flush(&mut actions);
            },
            Behavior::EchoEmpty => {
                self.submit(context, Reply::found(request.key, Bytes::new()), &mut actions);
            },
            Behavior::SizedValue(size) => {
                self.submit(context, sized_reply(request.key, size), &mut actions);
            },
            Behavior::Echo => {
                let reply = Reply::found(request.key.clone(), request.key);
                self.submit(context, reply, &mut actions);
            },
        }

        actions
    }

    /// Route a reply through the ordering discipline.
    fn submit(
        &mut self,
        context: CompletionContext,
        reply: Reply,
        actions: &mut Vec<HandlerAction>,
    ) {
        match self.ordering {
            OrderingMode::OutOfOrder => actions.push(HandlerAction::Send { context, reply }),
            OrderingMode::InOrder => {
                if self.queue.push(context, reply) == 1 {
                    self.flush(actions);
                }
            },
        }
    }

    /// Release every queued reply, oldest first.
    fn flush(&mut self, actions: &mut Vec<HandlerAction>) {
        if !self.queue.is_empty() {
            tracing::debug!(released = self.queue.len(), "flushing reply queue");
        }
        actions.extend(
            self.queue.flush().map(|entry| HandlerAction::Send {
                context: entry.context,
                reply: entry.reply,
            }),
        );
    }

    /// Replies currently queued or held.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Configured ordering discipline.
    #[must_use]
    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }
}

/// `Found` reply with `size` filler bytes, or `RemoteError` when the value
/// could never fit in a frame.
fn sized_reply(key: String, size: u64) -> Reply {
    match usize::try_from(size) {
        Ok(size) if size <= FrameHeader::MAX_VALUE_SIZE as usize => {
            Reply::found(key, vec![FILLER; size])
        },
        _ => {
            tracing::warn!(key = %key, size, "requested value exceeds frame limit");
            Reply::status(ReplyStatus::RemoteError)
        },
    }
}
