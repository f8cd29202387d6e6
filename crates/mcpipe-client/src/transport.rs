//! Client transport.
//!
//! [`Transport`] multiplexes requests over one lazily opened connection. An
//! I/O task connects, performs the handshake and writes request frames in
//! submission order; a reader task matches reply frames to requests by id.
//!
//! Every request moves through two phases, pending (submitted, not yet
//! written) and in-flight (written, awaiting a reply), and ends in exactly
//! one terminal transition. Each phase change is reported to the status
//! observer as a [`StatusDelta`]:
//!
//! | transition                          | delta      |
//! |-------------------------------------|------------|
//! | submitted                           | `(+1, 0)`  |
//! | written                             | `(-1, +1)` |
//! | reply received                      | `(0, -1)`  |
//! | timeout or failure while pending    | `(-1, 0)`  |
//! | timeout or failure while in flight  | `(0, -1)`  |

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use mcpipe_core::{StatusDelta, frame_io};
use mcpipe_proto::{Frame, Reply, ReplyStatus, Request};
use tokio::{
    io::{ReadHalf, WriteHalf},
    sync::{mpsc, oneshot},
    task::{AbortHandle, JoinHandle},
};

use crate::{
    connector::Connector,
    error::TransportError,
    options::{ClientOptions, SecureChannel},
};

type StatusObserver = Box<dyn FnMut(StatusDelta) + Send>;
type UpCallback = Box<dyn FnMut() + Send>;
type DownCallback = Box<dyn FnMut(bool) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    InFlight,
}

struct Entry {
    phase: Phase,
    reply: oneshot::Sender<Reply>,
}

#[derive(Default)]
struct Inner {
    requests: HashMap<u32, Entry>,
    up: bool,
    reader: Option<AbortHandle>,
    observer: Option<StatusObserver>,
    on_up: Option<UpCallback>,
    on_down: Option<DownCallback>,
}

impl Inner {
    fn notify(&mut self, delta: StatusDelta) {
        if let Some(observer) = self.observer.as_mut() {
            observer(delta);
        }
    }

    /// Remove every request in `phase`, answering each with `status`.
    fn fail_all(&mut self, phase: Phase, status: ReplyStatus) {
        let failed: Vec<u32> =
            self.requests.iter().filter(|(_, e)| e.phase == phase).map(|(id, _)| *id).collect();

        let delta = match phase {
            Phase::Pending => StatusDelta::ABANDONED_PENDING,
            Phase::InFlight => StatusDelta::ABANDONED_INFLIGHT,
        };
        for id in failed {
            if let Some(entry) = self.requests.remove(&id) {
                self.notify(delta);
                let _ = entry.reply.send(Reply::status(status));
            }
        }
    }

    fn down(&mut self, aborting: bool) {
        tracing::info!("Client DOWN.");
        if let Some(on_down) = self.on_down.as_mut() {
            on_down(aborting);
        }
    }
}

/// State shared by the caller, the I/O task and the reader task.
///
/// Callbacks run with the lock held and must not call back into the
/// transport.
#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(&self, id: u32, reply: oneshot::Sender<Reply>) {
        let mut inner = self.lock();
        inner.requests.insert(id, Entry { phase: Phase::Pending, reply });
        inner.notify(StatusDelta::SUBMITTED);
    }

    fn is_pending(&self, id: u32) -> bool {
        self.lock().requests.get(&id).is_some_and(|e| e.phase == Phase::Pending)
    }

    fn is_up(&self) -> bool {
        self.lock().up
    }

    /// Move a pending request in flight. False if it already ended.
    fn mark_written(&self, id: u32) -> bool {
        let mut inner = self.lock();
        match inner.requests.get_mut(&id) {
            Some(entry) if entry.phase == Phase::Pending => {
                entry.phase = Phase::InFlight;
                inner.notify(StatusDelta::WRITTEN);
                true
            },
            _ => false,
        }
    }

    fn complete(&self, id: u32, reply: Reply) {
        let mut inner = self.lock();
        let in_flight = inner.requests.get(&id).is_some_and(|e| e.phase == Phase::InFlight);
        if !in_flight {
            tracing::debug!(request_id = id, "reply for unknown or expired request");
            return;
        }
        if let Some(entry) = inner.requests.remove(&id) {
            inner.notify(StatusDelta::REPLIED);
            let _ = entry.reply.send(reply);
        }
    }

    /// End a request that timed out. False if it already ended.
    fn expire(&self, id: u32) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.requests.remove(&id) else {
            return false;
        };
        inner.notify(match entry.phase {
            Phase::Pending => StatusDelta::ABANDONED_PENDING,
            Phase::InFlight => StatusDelta::ABANDONED_INFLIGHT,
        });
        true
    }

    fn connection_up(&self, reader: AbortHandle) {
        let mut inner = self.lock();
        inner.up = true;
        inner.reader = Some(reader);
        tracing::info!("Client UP.");
        if let Some(on_up) = inner.on_up.as_mut() {
            on_up();
        }
    }

    fn connect_failed(&self) {
        let mut inner = self.lock();
        inner.fail_all(Phase::Pending, ReplyStatus::ConnectError);
        inner.down(false);
    }

    fn connection_lost(&self) {
        let mut inner = self.lock();
        if !inner.up {
            return;
        }
        inner.up = false;
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        inner.fail_all(Phase::InFlight, ReplyStatus::RemoteError);
        inner.down(false);
    }

    fn close(&self) {
        let mut inner = self.lock();
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        if inner.up {
            inner.up = false;
            inner.down(true);
        }
    }
}

/// Request frame queued for the I/O task.
struct Outbound {
    id: u32,
    frame: Frame,
}

/// Pipelined transport over one lazily opened connection.
///
/// Dropping the transport aborts its I/O and reader tasks.
pub struct Transport {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    io_task: JoinHandle<()>,
    next_id: AtomicU32,
    options: ClientOptions,
}

impl Transport {
    /// Create a transport. Nothing connects until the first request.
    ///
    /// Must be called within a tokio runtime.
    pub fn new<C: Connector>(connector: C, options: ClientOptions) -> Self {
        let shared = Arc::new(Shared::default());
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let io_task =
            tokio::spawn(run_io(connector, options.clone(), Arc::clone(&shared), outbound_rx));

        Self { shared, outbound, io_task, next_id: AtomicU32::new(1), options }
    }

    /// Options this transport was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Receive a [`StatusDelta`] for every request phase change.
    pub fn set_status_observer(&self, observer: impl FnMut(StatusDelta) + Send + 'static) {
        self.shared.lock().observer = Some(Box::new(observer));
    }

    /// Callbacks for the connection going up, and going down (`true` when
    /// the transport itself is being torn down).
    pub fn set_status_callbacks(
        &self,
        on_up: impl FnMut() + Send + 'static,
        on_down: impl FnMut(bool) + Send + 'static,
    ) {
        let mut inner = self.shared.lock();
        inner.on_up = Some(Box::new(on_up));
        inner.on_down = Some(Box::new(on_down));
    }

    /// Whether a connection is currently established.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.shared.is_up()
    }

    /// Send `request` and wait up to `timeout` for its reply.
    ///
    /// Never fails: transport problems come back as a reply whose status is
    /// `Timeout`, `ConnectError`, `RemoteError` or `LocalError`.
    pub async fn send_with_timeout(&self, request: &Request, timeout: Duration) -> Reply {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = match request.to_frame(id, self.options.session_flags()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(key = %request.key, error = %e, "request not encodable");
                return Reply::status(ReplyStatus::LocalError);
            },
        };

        let (reply_tx, mut reply_rx) = oneshot::channel();
        self.shared.submit(id, reply_tx);
        if self.outbound.send(Outbound { id, frame }).is_err() {
            self.shared.expire(id);
            return Reply::status(ReplyStatus::LocalError);
        }

        match tokio::time::timeout(timeout, &mut reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Reply::status(ReplyStatus::LocalError),
            Err(_) => {
                if self.shared.expire(id) {
                    tracing::debug!(request_id = id, ?timeout, "request timed out");
                    return Reply::status(ReplyStatus::Timeout);
                }
                // Answered between the deadline and the expiry.
                reply_rx.try_recv().unwrap_or_else(|_| Reply::status(ReplyStatus::LocalError))
            },
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.io_task.abort();
        self.shared.close();
    }
}

async fn run_io<C: Connector>(
    connector: C,
    options: ClientOptions,
    shared: Arc<Shared>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let mut writer: Option<WriteHalf<C::Stream>> = None;

    while let Some(Outbound { id, frame }) = outbound.recv().await {
        if !shared.is_pending(id) {
            continue;
        }

        if writer.is_none() || !shared.is_up() {
            writer = None;
            match open(&connector, &options).await {
                Ok((reader, opened)) => {
                    let task = tokio::spawn(read_replies(reader, Arc::clone(&shared)));
                    shared.connection_up(task.abort_handle());
                    writer = Some(opened);
                },
                Err(e) => {
                    tracing::warn!(
                        host = %options.host,
                        port = options.port,
                        error = %e,
                        "connect failed"
                    );
                    shared.connect_failed();
                    continue;
                },
            }
        }

        let Some(stream) = writer.as_mut() else {
            continue;
        };
        if !shared.mark_written(id) {
            continue;
        }

        let written =
            tokio::time::timeout(options.timeout, frame_io::write_frame(stream, &frame)).await;
        let failure = match written {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => TransportError::from(e),
            Err(_) => TransportError::Timeout(options.timeout),
        };
        tracing::warn!(request_id = id, error = %failure, "request write failed");
        writer = None;
        shared.connection_lost();
    }
}

async fn read_replies<S>(mut reader: ReadHalf<S>, shared: Arc<Shared>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    loop {
        let frame = match frame_io::read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("server closed the connection");
                break;
            },
            Err(e) => {
                tracing::warn!(error = %e, "reply read failed");
                break;
            },
        };

        match Reply::from_frame(&frame) {
            Ok(reply) => shared.complete(frame.header.request_id(), reply),
            Err(e) => {
                tracing::warn!(error = %e, "invalid reply frame");
                break;
            },
        }
    }
    shared.connection_lost();
}

/// Connect and complete the handshake within the client timeout.
async fn open<C: Connector>(
    connector: &C,
    options: &ClientOptions,
) -> Result<(ReadHalf<C::Stream>, WriteHalf<C::Stream>), TransportError> {
    let fingerprint = match &options.secure {
        SecureChannel::Plain => None,
        SecureChannel::Credentials(paths) => Some(paths.load()?.ca_fingerprint()),
    };
    let hello = options.hello(fingerprint);

    let handshake = async {
        let stream = connector
            .connect(&options.host, options.port)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        frame_io::write_frame(&mut writer, &hello.to_frame()?).await?;
        match frame_io::read_frame(&mut reader).await? {
            Some(frame) if hello.is_acked_by(&frame) => Ok((reader, writer)),
            Some(_) => Err(TransportError::Handshake("unexpected handshake reply".to_string())),
            None => Err(TransportError::Handshake("server closed the connection".to_string())),
        }
    };

    tokio::time::timeout(options.timeout, handshake)
        .await
        .map_err(|_| TransportError::Timeout(options.timeout))?
}
