//! Reply queue for ordered and held replies.
//!
//! The queue is owned by the [`crate::RequestHandler`], which is owned by the
//! single serving loop. Nothing else touches it, so it needs no locking. A
//! server that grows more than one worker must serialize access to it.

use std::collections::VecDeque;

use mcpipe_proto::{FrameFlags, Reply};

/// Obligation to answer exactly one request.
///
/// Neither `Clone` nor `Copy`: a context is moved into the queue or into a
/// send action and consumed by the reply, so a request can never be answered
/// twice.
#[derive(Debug, PartialEq, Eq)]
pub struct CompletionContext {
    connection_id: u64,
    request_id: u32,
    flags: FrameFlags,
}

impl CompletionContext {
    /// Bind a context to request `request_id` on `connection_id`, answered
    /// with the connection's session `flags`.
    #[must_use]
    pub fn new(connection_id: u64, request_id: u32, flags: FrameFlags) -> Self {
        Self { connection_id, request_id, flags: flags.session_bits() }
    }

    /// Connection the reply goes to.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Request being answered.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Session flags to encode the reply with.
    #[must_use]
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }
}

/// A reply bound to its context, waiting in the queue.
#[derive(Debug)]
pub struct QueuedReply {
    /// Who to answer
    pub context: CompletionContext,
    /// What to answer with
    pub reply: Reply,
}

/// FIFO of bound replies. Insertion order is delivery order.
#[derive(Debug, Default)]
pub struct ReplyQueue {
    entries: VecDeque<QueuedReply>,
}

impl ReplyQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bound reply. Returns the queue length after the append.
    pub fn push(&mut self, context: CompletionContext, reply: Reply) -> usize {
        self.entries.push_back(QueuedReply { context, reply });
        self.entries.len()
    }

    /// Remove every entry, oldest first.
    pub fn flush(&mut self) -> impl Iterator<Item = QueuedReply> + '_ {
        self.entries.drain(..)
    }

    /// Number of queued replies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a reply for this request is queued.
    #[must_use]
    pub fn contains(&self, connection_id: u64, request_id: u32) -> bool {
        self.entries.iter().any(|entry| {
            entry.context.connection_id == connection_id && entry.context.request_id == request_id
        })
    }
}

#[cfg(test)]
mod tests {
    use mcpipe_proto::ReplyStatus;

    use super::*;

    fn context(request_id: u32) -> CompletionContext {
        CompletionContext::new(1, request_id, FrameFlags::empty())
    }

    #[test]
    fn push_reports_length() {
        let mut queue = ReplyQueue::new();
        assert_eq!(queue.push(context(1), Reply::status(ReplyStatus::Stored)), 1);
        assert_eq!(queue.push(context(2), Reply::status(ReplyStatus::Stored)), 2);
        assert!(queue.contains(1, 2));
    }

    #[test]
    fn flush_drains_oldest_first() {
        let mut queue = ReplyQueue::new();
        for id in 0..5 {
            queue.push(context(id), Reply::status(ReplyStatus::NotFound));
        }

        let ids: Vec<u32> = queue.flush().map(|entry| entry.context.request_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn context_keeps_only_session_flags() {
        let flags = FrameFlags::empty().with(FrameFlags::TYPED, true).with(FrameFlags::SECURE, true);
        let context = CompletionContext::new(3, 9, flags);

        assert_eq!(context.flags(), FrameFlags::empty().with(FrameFlags::TYPED, true));
        assert_eq!(context.connection_id(), 3);
        assert_eq!(context.request_id(), 9);
    }
}
