//! Connection-level errors shared by the server and client.
//!
//! Protocol logic works with [`ConnectionError`]; `std::io::Error` only
//! appears at socket boundaries and is converted on the way in.

use std::{io, time::Duration};

use thiserror::Error;

use crate::secure::SecureChannelError;

/// Errors on a single connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Handshake did not complete
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Operation did not complete in time
    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Secure-channel credentials could not be loaded
    #[error("secure channel: {0}")]
    SecureChannel(#[from] SecureChannelError),

    /// Frame parsing or validation failed
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Protocol violations and credential failures are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Closed | Self::Transport(_))
    }
}

impl From<mcpipe_proto::ProtocolError> for ConnectionError {
    fn from(err: mcpipe_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Transport(err.to_string()),
        }
    }
}
