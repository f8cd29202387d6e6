//! Turmoil implementations of the server's `Listener` and the client's
//! `Connector`.

use std::{future::Future, io, net::SocketAddr};

use mcpipe_client::Connector;
use mcpipe_server::Listener;
use turmoil::net::{TcpListener, TcpStream};

/// Listener over turmoil's simulated TCP.
pub struct SimListener {
    inner: TcpListener,
}

impl SimListener {
    /// Bind inside the current turmoil host, e.g. `"0.0.0.0:11211"`.
    pub async fn bind(address: &str) -> io::Result<Self> {
        let inner = TcpListener::bind(address).await?;
        Ok(Self { inner })
    }
}

impl Listener for SimListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send {
        self.inner.accept()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Connector over turmoil's simulated TCP. `host` is a turmoil host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConnector;

impl Connector for SimConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let addr = format!("{host}:{port}");
        async move { TcpStream::connect(addr).await }
    }
}
