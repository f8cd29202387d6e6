//! mcpipe test server.
//!
//! Wraps [`mcpipe_core`]'s action-based [`mcpipe_core::RequestHandler`] with
//! real I/O: a single serving loop over an injected [`Listener`], reader
//! tasks per connection, and an [`Environment`](mcpipe_core::Environment)
//! for time.
//!
//! # Components
//!
//! - [`ServerHarness`]: the serving loop
//! - [`ServerHandle`]: shutdown flag and accepted-connection counter
//! - [`Listener`]: accept abstraction, implemented for tokio TCP here and
//!   for turmoil in `mcpipe-harness`
//! - [`SystemEnv`]: production environment (wall-clock time)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod listener;
mod server;
mod system_env;

pub use error::ServerError;
pub use listener::Listener;
pub use server::{ConnectionInfo, ServerHandle, ServerHarness};
pub use system_env::SystemEnv;
