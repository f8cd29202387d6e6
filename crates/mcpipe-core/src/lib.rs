//! Core logic of the mcpipe ordering and accounting harness.
//!
//! Everything in this crate is Sans-IO except [`frame_io`], which is a thin
//! async framing helper over any `AsyncRead`/`AsyncWrite`.
//!
//! # Server side
//!
//! - [`classifier`]: sentinel keys to [`Behavior`]
//! - [`reply_queue`]: FIFO of bound (context, reply) pairs
//! - [`handler`]: [`RequestHandler`] applying the ordering discipline and
//!   emitting [`HandlerAction`]s for the serving loop to execute
//! - [`config`]: immutable [`ServerConfig`]
//!
//! # Client side
//!
//! - [`accounting`]: pending/in-flight bookkeeping driven by [`StatusDelta`]s
//! - [`contract`]: reply validation mirroring the sentinel-key behavior
//!
//! # Shared
//!
//! - [`env`]: time abstraction so the same code runs under turmoil's virtual
//!   clock and the system clock
//! - [`secure`]: PEM credential loading for the modelled secure channel

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accounting;
pub mod classifier;
pub mod config;
pub mod contract;
pub mod env;
pub mod error;
pub mod frame_io;
pub mod handler;
pub mod reply_queue;
pub mod secure;

pub use accounting::{AccountingState, AccountingViolation, StatusDelta};
pub use classifier::{Behavior, classify};
pub use config::{OrderingMode, ServerConfig};
pub use contract::{BIG_VALUE_SIZE, ContractViolation, FILLER, big_value, validate_reply};
pub use env::Environment;
pub use error::ConnectionError;
pub use handler::{HandlerAction, RequestHandler};
pub use reply_queue::{CompletionContext, QueuedReply, ReplyQueue};
pub use secure::{CredentialPaths, SecureChannelError, SecureContext};
