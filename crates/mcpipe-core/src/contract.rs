//! Reply contract checked by the client.
//!
//! Mirrors the server's sentinel-key behavior: given the request that was
//! sent and the status the caller expects, decide whether a reply is what a
//! correct server would have produced.

use mcpipe_proto::{Operation, ProtocolVariant, Reply, ReplyStatus, Request};
use thiserror::Error;

use crate::classifier::{Behavior, classify};

/// Byte repeated in `value_size:<N>` replies.
pub const FILLER: u8 = b'a';

/// Size of [`big_value`].
pub const BIG_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Large payload for Set requests. Byte `i` is `b'A' + i % 26`.
#[must_use]
pub fn big_value() -> Vec<u8> {
    (b'A'..=b'Z').cycle().take(BIG_VALUE_SIZE).collect()
}

/// A reply that breaks the contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// `Found` reply without a value
    #[error("found reply for {key:?} carries no value")]
    MissingValue {
        /// Request key
        key: String,
    },

    /// `empty` answered with a non-empty value
    #[error("expected empty value, got {len} bytes")]
    ValueNotEmpty {
        /// Length received
        len: usize,
    },

    /// `value_size:<N>` answered with the wrong length
    #[error("expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Requested size
        expected: u64,
        /// Length received
        actual: usize,
    },

    /// `value_size:<N>` answered with mixed bytes
    #[error("sized value is not a single repeated byte")]
    SizedValueNotUniform,

    /// Echo value differs from the key
    #[error("value does not echo key {key:?}")]
    ValueMismatch {
        /// Request key
        key: String,
    },

    /// Keyed reply carries a different key
    #[error("reply key {actual:?} does not match request key {expected:?}")]
    KeyMismatch {
        /// Request key
        expected: String,
        /// Key in the reply
        actual: String,
    },

    /// Unexpected status
    #[error("expected status {expected}, got {actual}")]
    StatusMismatch {
        /// Status the caller expected
        expected: ReplyStatus,
        /// Status received
        actual: ReplyStatus,
    },
}

/// Check `reply` to `request` against the sentinel contract and `expected`.
///
/// Value checks apply only to `Found` replies to Get requests. The status is
/// checked last.
///
/// # Errors
///
/// The first [`ContractViolation`] found.
pub fn validate_reply(
    request: &Request,
    reply: &Reply,
    expected: ReplyStatus,
    variant: ProtocolVariant,
) -> Result<(), ContractViolation> {
    if reply.status == ReplyStatus::Found && request.operation == Operation::Get {
        validate_value(request, reply)?;

        if variant == ProtocolVariant::Keyed && reply.key != request.key {
            return Err(ContractViolation::KeyMismatch {
                expected: request.key.clone(),
                actual: reply.key.clone(),
            });
        }
    }

    if reply.status != expected {
        return Err(ContractViolation::StatusMismatch { expected, actual: reply.status });
    }
    Ok(())
}

fn validate_value(request: &Request, reply: &Reply) -> Result<(), ContractViolation> {
    let Some(value) = reply.value.as_deref() else {
        return Err(ContractViolation::MissingValue { key: request.key.clone() });
    };

    match classify(&request.key) {
        Behavior::EchoEmpty if !value.is_empty() => {
            Err(ContractViolation::ValueNotEmpty { len: value.len() })
        },
        Behavior::EchoEmpty => Ok(()),
        Behavior::SizedValue(size) => {
            if u64::try_from(value.len()).ok() != Some(size) {
                return Err(ContractViolation::SizeMismatch { expected: size, actual: value.len() });
            }
            match value.split_first() {
                Some((first, rest)) if rest.iter().any(|b| b != first) => {
                    Err(ContractViolation::SizedValueNotUniform)
                },
                _ => Ok(()),
            }
        },
        _ if value != request.key.as_bytes() => {
            Err(ContractViolation::ValueMismatch { key: request.key.clone() })
        },
        _ => Ok(()),
    }
}
