//! Protocol errors.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Magic number mismatch
    #[error("invalid magic number")]
    InvalidMagic,

    /// Unknown protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Key exceeds [`crate::FrameHeader::MAX_KEY_SIZE`]
    #[error("key too large: {size} bytes (max {max})")]
    KeyTooLarge {
        /// Actual key size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Value exceeds [`crate::FrameHeader::MAX_VALUE_SIZE`]
    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge {
        /// Actual value size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Payload shorter than the header claims
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload bytes claimed by the header
        expected: usize,
        /// Payload bytes present
        actual: usize,
    },

    /// Opcode byte not recognized
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// Opcode valid but not allowed here
    #[error("unexpected opcode: expected {expected:?}, got {actual:#04x}")]
    UnexpectedOpcode {
        /// Opcode the decoder wanted
        expected: crate::Opcode,
        /// Opcode found in the header
        actual: u8,
    },

    /// Status byte not recognized
    #[error("unknown reply status: {0}")]
    UnknownStatus(u8),

    /// Key is not valid UTF-8
    #[error("key is not valid utf-8")]
    InvalidKey,

    /// Handshake payload malformed
    #[error("invalid hello: {0}")]
    InvalidHello(String),
}
