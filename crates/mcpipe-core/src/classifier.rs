//! Sentinel-key classification.
//!
//! A small layered convention on top of the key space: a handful of reserved
//! keys make the server stall, hold, flush or shut down instead of echoing.

/// Key that stalls the serving loop.
pub const SLEEP_KEY: &str = "sleep";
/// Key that stops the server.
pub const SHUTDOWN_KEY: &str = "shutdown";
/// Key whose reply is withheld until a flush.
pub const HOLD_KEY: &str = "hold";
/// Key that releases every queued reply.
pub const FLUSH_KEY: &str = "flush";
/// Key answered with a zero-length value.
pub const EMPTY_KEY: &str = "empty";
/// Prefix of keys answered with a value of the given size.
pub const VALUE_SIZE_PREFIX: &str = "value_size:";

/// Server behavior selected by a Get request's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Stall the serving loop, then reply not-found
    Delay,
    /// Stop the server after replying not-found and flushing
    Shutdown,
    /// Queue the reply until an explicit flush
    Hold,
    /// Reply, then flush everything queued
    FlushNow,
    /// Reply with a present, zero-length value
    EchoEmpty,
    /// Reply with a value of this many filler bytes
    SizedValue(u64),
    /// Reply with the key as the value
    Echo,
}

/// Classify `key`. First match wins, in the order of the variants above.
///
/// A `value_size:` suffix that is not a plain unsigned decimal (or overflows
/// `u64`) classifies as [`Behavior::Echo`].
#[must_use]
pub fn classify(key: &str) -> Behavior {
    match key {
        SLEEP_KEY => Behavior::Delay,
        SHUTDOWN_KEY => Behavior::Shutdown,
        HOLD_KEY => Behavior::Hold,
        FLUSH_KEY => Behavior::FlushNow,
        EMPTY_KEY => Behavior::EchoEmpty,
        _ => key
            .strip_prefix(VALUE_SIZE_PREFIX)
            .and_then(parse_size)
            .map_or(Behavior::Echo, Behavior::SizedValue),
    }
}

/// Requested size of a `value_size:<N>` key, `None` for any other key.
#[must_use]
pub fn requested_size(key: &str) -> Option<u64> {
    match classify(key) {
        Behavior::SizedValue(size) => Some(size),
        _ => None,
    }
}

fn parse_size(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
