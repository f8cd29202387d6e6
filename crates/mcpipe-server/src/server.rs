//! The serving loop.
//!
//! Exactly one loop owns the [`RequestHandler`], its reply queue and every
//! connection's write half. Reader tasks forward events over a channel; the
//! loop handles them one at a time and executes the resulting actions in
//! order. A `Stall` action is awaited inline, so nothing else on the loop
//! runs while a `sleep` request is being served.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use mcpipe_core::{
    CompletionContext, ConnectionError, Environment, HandlerAction, RequestHandler, ServerConfig,
    frame_io,
};
use mcpipe_proto::{FrameFlags, Hello, ProtocolVariant, Qos, Reply, ReplyStatus};
use tokio::{
    io::{AsyncWriteExt, WriteHalf},
    sync::{OwnedSemaphorePermit, mpsc},
    task::JoinHandle,
};

use crate::{
    Listener, ServerError,
    connection::{ReaderSettings, ServerEvent, run_reader},
};

/// Events buffered between reader tasks and the loop.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Description of an accepted connection, passed to the accept hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Server-assigned connection id
    pub id: u64,
    /// Peer address
    pub peer: SocketAddr,
    /// Whether the connection completed a secure handshake
    pub secure: bool,
    /// Protocol variant requested by the client
    pub variant: ProtocolVariant,
    /// Whether typed encoding was requested
    pub typed: bool,
    /// QoS tags, if the client set any
    pub qos: Option<Qos>,
}

/// Cloneable handle to a running server.
#[derive(Debug, Clone, Default)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    accepted: Arc<AtomicUsize>,
}

impl ServerHandle {
    /// Ask the serving loop to stop. It notices within one poll interval.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Connections that completed the handshake since the server started.
    #[must_use]
    pub fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }
}

type AcceptHook = Box<dyn Fn(&ConnectionInfo) + Send>;

/// Test server driving a [`RequestHandler`] over real or simulated TCP.
pub struct ServerHarness<E: Environment, L: Listener> {
    env: E,
    listener: L,
    config: ServerConfig,
    fingerprint: Option<[u8; 32]>,
    handle: ServerHandle,
    on_accepted: Option<AcceptHook>,
}

impl<E: Environment, L: Listener> ServerHarness<E, L> {
    /// Create a server on an already-bound `listener`.
    ///
    /// Secure credentials in `config` are loaded here.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Config`] if the credentials cannot be loaded
    pub fn new(env: E, listener: L, config: ServerConfig) -> Result<Self, ServerError> {
        let fingerprint = match &config.secure {
            Some(paths) => Some(paths.load()?.ca_fingerprint()),
            None => None,
        };

        Ok(Self {
            env,
            listener,
            config,
            fingerprint,
            handle: ServerHandle::default(),
            on_accepted: None,
        })
    }

    /// Handle for shutdown and the accepted-connection counter.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Invoke `hook` once for every connection that completes the handshake.
    pub fn on_connection_accepted(&mut self, hook: impl Fn(&ConnectionInfo) + Send + 'static) {
        self.on_accepted = Some(Box::new(hook));
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Transport`] if the listener cannot report it
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the serving loop until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Currently infallible once constructed; accept failures are logged and
    /// the loop keeps serving.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { env, listener, config, fingerprint, handle, on_accepted } = self;

        tracing::info!(
            addr = ?listener.local_addr().ok(),
            ordering = ?config.ordering,
            secure = fingerprint.is_some(),
            "server starting"
        );

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut state = LoopState {
            handler: RequestHandler::from_config(&config),
            settings: ReaderSettings { fingerprint, max_inflight: config.max_inflight },
            env: env.clone(),
            config,
            handle,
            on_accepted,
            connections: HashMap::new(),
            next_id: 1,
            events: events_tx,
        };

        while !state.handle.is_shutdown() {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => state.on_accept(stream, peer),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                Some(event) = events_rx.recv() => state.on_event(event).await,
                () = env.sleep(state.config.poll_interval) => {},
            }
        }

        state.stop().await;
        Ok(())
    }
}

/// Open connection as seen by the loop.
struct Connection<S> {
    peer: SocketAddr,
    flags: FrameFlags,
    writer: Option<WriteHalf<S>>,
    reader: JoinHandle<()>,
    permits: HashMap<u32, OwnedSemaphorePermit>,
}

struct LoopState<E: Environment, S> {
    handler: RequestHandler,
    settings: ReaderSettings,
    env: E,
    config: ServerConfig,
    handle: ServerHandle,
    on_accepted: Option<AcceptHook>,
    connections: HashMap<u64, Connection<S>>,
    next_id: u64,
    events: mpsc::Sender<ServerEvent<S>>,
}

impl<E, S> LoopState<E, S>
where
    E: Environment,
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    fn on_accept(&mut self, stream: S, peer: SocketAddr) {
        if self.connections.len() >= self.config.max_connections {
            tracing::warn!(%peer, limit = self.config.max_connections, "connection limit reached");
            drop(stream);
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(connection = id, %peer, "connection opened");

        let reader = tokio::spawn(run_reader(id, stream, self.settings, self.events.clone()));
        self.connections.insert(id, Connection {
            peer,
            flags: FrameFlags::empty(),
            writer: None,
            reader,
            permits: HashMap::new(),
        });
    }

    async fn on_event(&mut self, event: ServerEvent<S>) {
        match event {
            ServerEvent::HandshakeComplete { id, hello, writer } => {
                self.on_handshake(id, &hello, writer).await;
            },
            ServerEvent::Request { id, request_id, request, permit } => {
                let Some(conn) = self.connections.get_mut(&id) else {
                    return;
                };
                if let Some(permit) = permit {
                    conn.permits.insert(request_id, permit);
                }

                let context = CompletionContext::new(id, request_id, conn.flags);
                let actions = self.handler.handle(context, request);
                self.execute(actions).await;
            },
            ServerEvent::Closed { id, reason } => {
                if self.connections.remove(&id).is_some() {
                    tracing::debug!(connection = id, %reason, "connection closed");
                }
            },
        }
    }

    /// Count the connection, run the hook, then acknowledge. A client that
    /// has seen its `HelloAck` is therefore already counted.
    async fn on_handshake(&mut self, id: u64, hello: &Hello, mut writer: WriteHalf<S>) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        conn.flags = hello.flags.session_bits();

        let info = ConnectionInfo {
            id,
            peer: conn.peer,
            secure: hello.secure_fingerprint.is_some(),
            variant: hello.flags.variant(),
            typed: hello.flags.typed(),
            qos: hello.qos,
        };
        self.handle.accepted.fetch_add(1, Ordering::AcqRel);
        tracing::info!(
            connection = id,
            peer = %info.peer,
            secure = info.secure,
            variant = ?info.variant,
            "connection accepted"
        );

        if let Some(hook) = &self.on_accepted {
            hook(&info);
        }

        let acked = match hello.ack() {
            Ok(ack) => tokio::time::timeout(
                self.config.send_timeout,
                frame_io::write_frame(&mut writer, &ack),
            )
            .await
            .map_err(|_| ConnectionError::Timeout { elapsed: self.config.send_timeout })
            .and_then(|written| written),
            Err(e) => Err(e.into()),
        };

        match acked {
            Ok(()) => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.writer = Some(writer);
                }
            },
            Err(e) => {
                tracing::warn!(connection = id, error = %e, "handshake ack failed");
                self.close(id);
            },
        }
    }

    async fn execute(&mut self, actions: Vec<HandlerAction>) {
        for action in actions {
            match action {
                HandlerAction::Stall(duration) => {
                    tracing::debug!(?duration, "stalling serving loop");
                    self.env.sleep(duration).await;
                },
                HandlerAction::Shutdown => {
                    tracing::info!("shutdown requested");
                    self.handle.shutdown();
                },
                HandlerAction::Send { context, reply } => self.send(context, &reply).await,
            }
        }
    }

    async fn send(&mut self, context: CompletionContext, reply: &Reply) {
        let id = context.connection_id();
        let request_id = context.request_id();
        let Some(conn) = self.connections.get_mut(&id) else {
            tracing::debug!(connection = id, request_id, "dropping reply for closed connection");
            return;
        };
        let Some(writer) = conn.writer.as_mut() else {
            return;
        };

        let frame = match reply.to_frame(request_id, context.flags()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(connection = id, request_id, error = %e, "reply not encodable");
                match Reply::status(ReplyStatus::RemoteError).to_frame(request_id, context.flags())
                {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "status reply not encodable");
                        return;
                    },
                }
            },
        };

        let written =
            tokio::time::timeout(self.config.send_timeout, frame_io::write_frame(writer, &frame))
                .await;
        conn.permits.remove(&request_id);

        match written {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::warn!(connection = id, request_id, error = %e, "reply write failed");
                self.close(id);
            },
            Err(_) => {
                tracing::warn!(
                    connection = id,
                    request_id,
                    timeout = ?self.config.send_timeout,
                    "reply write timed out"
                );
                self.close(id);
            },
        }
    }

    fn close(&mut self, id: u64) {
        if let Some(conn) = self.connections.remove(&id) {
            conn.reader.abort();
        }
    }

    async fn stop(&mut self) {
        tracing::info!(
            connections = self.connections.len(),
            queued = self.handler.queued(),
            "server shutting down"
        );

        for (_, mut conn) in self.connections.drain() {
            conn.reader.abort();
            if let Some(writer) = conn.writer.as_mut() {
                let _ = writer.shutdown().await;
            }
        }
    }
}
