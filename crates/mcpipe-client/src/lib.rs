//! mcpipe concurrent client.
//!
//! # Components
//!
//! - [`Transport`]: pipelined requests over one lazily opened connection,
//!   with send-with-timeout, up/down callbacks and per-request status deltas
//! - [`ConcurrentClient`]: cooperative task scheduler that checks every reply
//!   and keeps pending/in-flight accounting
//! - [`Connector`]: outbound connection abstraction ([`TcpConnector`] here,
//!   turmoil in `mcpipe-harness`)
//! - [`ClientOptions`] and [`SecureChannel`]: connection settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod connector;
mod error;
mod options;
mod transport;

pub use client::{ConcurrentClient, SET_TIMEOUT};
pub use connector::{Connector, TcpConnector};
pub use error::TransportError;
pub use options::{ClientOptions, DEFAULT_TIMEOUT, SecureChannel};
pub use transport::Transport;
