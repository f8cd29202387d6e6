//! Operations for model-based testing.

use arbitrary::Arbitrary;
use mcpipe_proto::{ReplyStatus, Request};

/// One request a client can pipeline.
///
/// Excludes `sleep` and `shutdown`: both are covered by scenario tests, and
/// neither changes the release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ModelOp {
    /// Get of an ordinary key, echoed back
    Echo(u8),
    /// Get of `empty`
    Empty,
    /// Get of `value_size:<n>`
    Sized(u8),
    /// Get of a `value_size:` key with a non-numeric suffix, echoed back
    Malformed(u8),
    /// Get of `hold`
    Hold,
    /// Get of `flush`
    Flush,
    /// Set of an ordinary key
    Set(u8),
}

impl ModelOp {
    /// The request this operation sends.
    #[must_use]
    pub fn request(&self) -> Request {
        match *self {
            Self::Echo(n) => Request::get(format!("key{n}")),
            Self::Empty => Request::get("empty"),
            Self::Sized(n) => Request::get(format!("value_size:{n}")),
            Self::Malformed(n) => Request::get(format!("value_size:x{n}")),
            Self::Hold => Request::get("hold"),
            Self::Flush => Request::get("flush"),
            Self::Set(n) => Request::set(format!("key{n}"), format!("value{n}").into_bytes()),
        }
    }

    /// Status the server answers this operation with.
    #[must_use]
    pub fn expected_status(&self) -> ReplyStatus {
        match self {
            Self::Set(_) => ReplyStatus::Stored,
            _ => ReplyStatus::Found,
        }
    }

    /// Whether the reply waits for an explicit flush.
    #[must_use]
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold)
    }

    /// Whether the request releases everything waiting.
    #[must_use]
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }
}
