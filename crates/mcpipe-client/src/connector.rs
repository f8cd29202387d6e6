//! Outbound connection abstraction.

use std::{future::Future, io};

use tokio::io::{AsyncRead, AsyncWrite};

/// Opens byte streams to a server.
///
/// Implemented here for tokio TCP and in `mcpipe-harness` for turmoil.
pub trait Connector: Send + Sync + 'static {
    /// Connected stream type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connect to `host:port`.
    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connector over tokio TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = tokio::net::TcpStream;

    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let addr = format!("{host}:{port}");
        async move { tokio::net::TcpStream::connect(addr).await }
    }
}
