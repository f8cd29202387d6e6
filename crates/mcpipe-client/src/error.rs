//! Client transport errors.
//!
//! These never reach the caller of a send: every failure is turned into a
//! terminal reply status. They exist for logging and for connect results.

use std::time::Duration;

use mcpipe_core::{ConnectionError, SecureChannelError};
use mcpipe_proto::ProtocolError;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// Server did not accept the handshake
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Connect and handshake did not finish in time
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Secure-channel credentials could not be loaded
    #[error("credentials: {0}")]
    Credentials(#[from] SecureChannelError),

    /// Established connection failed
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        Self::Connection(err.into())
    }
}
