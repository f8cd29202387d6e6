//! Per-connection reader tasks.
//!
//! A reader owns the socket until it has verified the client's Hello, then
//! hands the write half to the serving loop and only forwards decoded
//! requests. It never touches the handler or the reply queue.

use std::sync::Arc;

use mcpipe_core::{ConnectionError, frame_io};
use mcpipe_proto::{Hello, Request};
use tokio::{
    io::{AsyncRead, AsyncWrite, WriteHalf},
    sync::{OwnedSemaphorePermit, Semaphore, mpsc},
};

/// Event forwarded from a reader task to the serving loop.
pub(crate) enum ServerEvent<S> {
    /// Handshake accepted; the loop acknowledges it
    HandshakeComplete {
        /// Connection
        id: u64,
        /// Accepted handshake
        hello: Hello,
        /// Write half, owned by the loop from now on
        writer: WriteHalf<S>,
    },
    /// Request decoded
    Request {
        /// Connection
        id: u64,
        /// Request id from the frame header
        request_id: u32,
        /// Decoded request
        request: Request,
        /// In-flight slot, released once the reply is written
        permit: Option<OwnedSemaphorePermit>,
    },
    /// Reader finished
    Closed {
        /// Connection
        id: u64,
        /// Why
        reason: String,
    },
}

/// Settings a reader needs from the server.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReaderSettings {
    /// CA fingerprint required from clients, `None` for plain mode
    pub fingerprint: Option<[u8; 32]>,
    /// Per-connection in-flight limit (0 = unlimited)
    pub max_inflight: usize,
}

/// Run a reader for connection `id` until the peer closes or misbehaves.
/// Always ends with exactly one [`ServerEvent::Closed`].
pub(crate) async fn run_reader<S>(
    id: u64,
    stream: S,
    settings: ReaderSettings,
    events: mpsc::Sender<ServerEvent<S>>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let reason = match read_connection(id, stream, settings, &events).await {
        Ok(()) => "closed by peer".to_string(),
        Err(e) => e.to_string(),
    };
    let _ = events.send(ServerEvent::Closed { id, reason }).await;
}

async fn read_connection<S>(
    id: u64,
    stream: S,
    settings: ReaderSettings,
    events: &mpsc::Sender<ServerEvent<S>>,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);

    let hello = match frame_io::read_frame(&mut reader).await? {
        Some(frame) => Hello::from_frame(&frame)?,
        None => return Err(ConnectionError::Closed),
    };

    if let Err(e) = verify_hello(&hello, settings.fingerprint) {
        tracing::warn!(connection = id, error = %e, "rejecting handshake");
        return Err(e);
    }

    if events.send(ServerEvent::HandshakeComplete { id, hello, writer }).await.is_err() {
        return Ok(());
    }

    let limit = (settings.max_inflight > 0).then(|| Arc::new(Semaphore::new(settings.max_inflight)));

    loop {
        let permit = match &limit {
            Some(limit) => Some(
                Arc::clone(limit)
                    .acquire_owned()
                    .await
                    .map_err(|e| ConnectionError::Transport(e.to_string()))?,
            ),
            None => None,
        };

        let Some(frame) = frame_io::read_frame(&mut reader).await? else {
            return Ok(());
        };
        let request_id = frame.header.request_id();
        let request = Request::from_frame(&frame)?;

        if events.send(ServerEvent::Request { id, request_id, request, permit }).await.is_err() {
            return Ok(());
        }
    }
}

/// Check the client's secure mode and trusted CA against the server's.
fn verify_hello(hello: &Hello, fingerprint: Option<[u8; 32]>) -> Result<(), ConnectionError> {
    match (fingerprint, hello.secure_fingerprint) {
        (None, None) => Ok(()),
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        (Some(_), Some(_)) => {
            Err(ConnectionError::HandshakeRejected("client trusts a different CA".to_string()))
        },
        (Some(_), None) => {
            Err(ConnectionError::HandshakeRejected("plain client on secure server".to_string()))
        },
        (None, Some(_)) => {
            Err(ConnectionError::HandshakeRejected("secure client on plain server".to_string()))
        },
    }
}
