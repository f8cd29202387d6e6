//! Concurrent test client.
//!
//! [`ConcurrentClient`] queues request tasks on a single-threaded cooperative
//! scheduler. Tasks are only polled inside [`ConcurrentClient::wait_for_replies`],
//! first in the order they were queued, so requests are submitted in
//! program order and may complete in any order.
//!
//! Every reply is checked against the sentinel-key contract, and every
//! accounting change against [`AccountingState`]'s invariants. Any failure
//! panics: this is a correctness harness, not a resilient client.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use futures::{StreamExt, future::LocalBoxFuture, stream::FuturesUnordered};
use mcpipe_core::{AccountingState, AccountingViolation, validate_reply};
use mcpipe_proto::{ProtocolVariant, Reply, ReplyStatus, Request};

use crate::{connector::Connector, options::ClientOptions, transport::Transport};

/// Timeout applied to every Set request.
pub const SET_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct Ledger {
    state: AccountingState,
    violation: Option<AccountingViolation>,
}

/// Client issuing concurrent requests and checking every reply.
pub struct ConcurrentClient {
    transport: Arc<Transport>,
    ledger: Arc<Mutex<Ledger>>,
    tasks: FuturesUnordered<LocalBoxFuture<'static, ()>>,
    variant: ProtocolVariant,
}

impl ConcurrentClient {
    /// Build a client and register its accounting observer on a new
    /// transport. Must be called within a tokio runtime.
    pub fn new<C: Connector>(connector: C, options: ClientOptions) -> Self {
        let variant = options.variant;
        let transport = Transport::new(connector, options);
        let ledger = Arc::new(Mutex::new(Ledger::default()));

        let sink = Arc::clone(&ledger);
        transport.set_status_observer(move |delta| {
            let mut ledger = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(violation) = ledger.state.apply(delta) {
                tracing::error!(%violation, ?delta, "accounting violation");
                ledger.violation.get_or_insert(violation);
            }
        });

        Self { transport: Arc::new(transport), ledger, tasks: FuturesUnordered::new(), variant }
    }

    /// Forwarded to [`Transport::set_status_callbacks`].
    pub fn set_status_callbacks(
        &self,
        on_up: impl FnMut() + Send + 'static,
        on_down: impl FnMut(bool) + Send + 'static,
    ) {
        self.transport.set_status_callbacks(on_up, on_down);
    }

    /// Queue a Get for `key` expecting `expected` within `timeout`.
    pub fn send_get(&mut self, key: impl Into<String>, expected: ReplyStatus, timeout: Duration) {
        self.queue(Request::get(key), expected, timeout);
    }

    /// Queue a Set of `value` under `key` expecting `expected`.
    pub fn send_set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
        expected: ReplyStatus,
    ) {
        self.queue(Request::set(key, value), expected, SET_TIMEOUT);
    }

    fn queue(&mut self, request: Request, expected: ReplyStatus, timeout: Duration) {
        let transport = Arc::clone(&self.transport);
        let variant = self.variant;

        self.tasks.push(Box::pin(async move {
            let reply = transport.send_with_timeout(&request, timeout).await;
            check_reply(&request, &reply, expected, variant);
        }));
    }

    /// Drive queued tasks until at most `remaining` are outstanding.
    ///
    /// With `remaining == 0` also asserts that no request is pending or in
    /// flight.
    ///
    /// # Panics
    ///
    /// On any contract or accounting violation.
    pub async fn wait_for_replies(&mut self, remaining: usize) {
        while self.tasks.len() > remaining {
            if self.tasks.next().await.is_none() {
                break;
            }
            self.check_ledger();
        }
        self.check_ledger();

        if remaining == 0 {
            let state = self.accounting();
            assert_eq!(state.pending(), 0, "pending requests remain after all replies");
            assert_eq!(state.inflight(), 0, "in-flight requests remain after all replies");
        }
    }

    /// Snapshot of the accounting counters.
    #[must_use]
    pub fn accounting(&self) -> AccountingState {
        self.ledger().state.clone()
    }

    /// Tasks queued or running.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::panic)]
    fn check_ledger(&self) {
        if let Some(violation) = self.ledger().violation {
            panic!("accounting violation: {violation}");
        }
    }
}

#[allow(clippy::panic)]
fn check_reply(
    request: &Request,
    reply: &Reply,
    expected: ReplyStatus,
    variant: ProtocolVariant,
) {
    if let Err(violation) = validate_reply(request, reply, expected, variant) {
        panic!("request {:?} for {:?}: {violation}", request.operation, request.key);
    }
}
