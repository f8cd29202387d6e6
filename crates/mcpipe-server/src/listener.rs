//! Listener abstraction.
//!
//! The serving loop accepts connections from an injected, already-bound
//! listener so the same loop runs over tokio TCP in production and over
//! turmoil's simulated TCP in tests.

use std::{future::Future, io, net::SocketAddr};

use tokio::io::{AsyncRead, AsyncWrite};

/// A bound listener producing byte streams.
pub trait Listener: Send + 'static {
    /// Accepted connection type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next connection. Must be cancel-safe: the serving loop
    /// polls it inside `select!`.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Listener for tokio::net::TcpListener {
    type Stream = tokio::net::TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send {
        tokio::net::TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        tokio::net::TcpListener::local_addr(self)
    }
}
