//! Server error types.

use mcpipe_core::SecureChannelError;
use thiserror::Error;

/// Errors that stop the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (unreadable credentials, bad bind address).
    ///
    /// Fatal; fix the configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport error (bind failure, listener failure).
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<SecureChannelError> for ServerError {
    fn from(err: SecureChannelError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
