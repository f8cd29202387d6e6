//! Wire framing for the mcpipe request/reply protocol.
//!
//! Every message on a connection is a [`Frame`]: a fixed 20-byte raw binary
//! header (Big Endian) followed by the key bytes and then the value bytes. The
//! header carries everything needed to route and correlate a message without
//! looking at the payload.
//!
//! # Components
//!
//! - [`FrameHeader`]: zero-copy header with magic, version, flags, opcode,
//!   status, request id, QoS tags and payload sizes
//! - [`Frame`]: header plus raw payload
//! - [`Request`], [`Reply`], [`Hello`]: typed messages built on top of frames
//!
//! This framing is intentionally small. It exists so the harness has a real
//! byte stream to pipeline requests over; it is not a memcache codec.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod flags;
mod frame;
mod header;
mod message;
mod opcode;

pub use errors::{ProtocolError, Result};
pub use flags::{FrameFlags, ProtocolVariant};
pub use frame::Frame;
pub use header::FrameHeader;
pub use message::{Hello, Operation, Qos, Reply, ReplyStatus, Request};
pub use opcode::Opcode;
