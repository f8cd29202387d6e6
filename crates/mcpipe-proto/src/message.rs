//! Typed messages carried in frames.

use std::fmt;

use bytes::Bytes;

use crate::{
    Frame, FrameFlags, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// Request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read a key
    Get,
    /// Store a value under a key
    Set,
}

/// A client request. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Full key
    pub key: String,
    /// Operation to perform
    pub operation: Operation,
    /// Value for Set requests
    pub value: Option<Bytes>,
}

impl Request {
    /// Get request for `key`.
    pub fn get(key: impl Into<String>) -> Self {
        Self { key: key.into(), operation: Operation::Get, value: None }
    }

    /// Set request storing `value` under `key`.
    pub fn set(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self { key: key.into(), operation: Operation::Set, value: Some(value.into()) }
    }

    /// Encode into a frame tagged with `request_id` and the session `flags`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::KeyTooLarge` / `ValueTooLarge` on oversized parts
    pub fn to_frame(&self, request_id: u32, flags: FrameFlags) -> Result<Frame> {
        let opcode = match self.operation {
            Operation::Get => Opcode::Get,
            Operation::Set => Opcode::Set,
        };

        let mut header = FrameHeader::new(opcode);
        header.set_request_id(request_id);
        header.set_flags(flags.session_bits());

        let value = self.value.as_deref().unwrap_or_default();
        Frame::new(header, self.key.as_bytes(), value)
    }

    /// Decode a Get or Set frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedOpcode` for non-request frames
    /// - `ProtocolError::InvalidKey` if the key is not UTF-8
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let operation = match frame.header.opcode_enum() {
            Some(Opcode::Get) => Operation::Get,
            Some(Opcode::Set) => Operation::Set,
            _ => {
                return Err(ProtocolError::UnexpectedOpcode {
                    expected: Opcode::Get,
                    actual: frame.header.opcode(),
                });
            },
        };

        let key = std::str::from_utf8(frame.key()).map_err(|_| ProtocolError::InvalidKey)?;
        let value = match operation {
            Operation::Get => None,
            Operation::Set => Some(frame.value()),
        };

        Ok(Self { key: key.to_owned(), operation, value })
    }
}

/// Outcome of a request.
///
/// `Found`, `NotFound` and `Stored` are server outcomes. The remaining
/// statuses are terminal transport outcomes produced on the client side;
/// `RemoteError` is also sent by the server when a reply cannot be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyStatus {
    /// Key found, reply carries a value
    Found,
    /// Key not found
    NotFound,
    /// Set accepted
    Stored,
    /// No reply within the request timeout
    Timeout,
    /// Connection could not be established
    ConnectError,
    /// Server failed the request or dropped the connection
    RemoteError,
    /// Request could not be sent
    LocalError,
}

impl ReplyStatus {
    /// Raw status byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Found => 1,
            Self::NotFound => 2,
            Self::Stored => 3,
            Self::Timeout => 4,
            Self::ConnectError => 5,
            Self::RemoteError => 6,
            Self::LocalError => 7,
        }
    }

    /// Status from its raw byte.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownStatus` for unrecognized bytes
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Found),
            2 => Ok(Self::NotFound),
            3 => Ok(Self::Stored),
            4 => Ok(Self::Timeout),
            5 => Ok(Self::ConnectError),
            6 => Ok(Self::RemoteError),
            7 => Ok(Self::LocalError),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }

    /// Whether this status was produced by the transport rather than by the
    /// server's request handling.
    #[must_use]
    pub const fn is_transport_failure(self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectError | Self::RemoteError | Self::LocalError)
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Found => "found",
            Self::NotFound => "notfound",
            Self::Stored => "stored",
            Self::Timeout => "timeout",
            Self::ConnectError => "connect_error",
            Self::RemoteError => "remote_error",
            Self::LocalError => "local_error",
        };
        f.write_str(name)
    }
}

/// Reply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Outcome
    pub status: ReplyStatus,
    /// Key echoed by the server (empty for the compact variant and for
    /// transport failures)
    pub key: String,
    /// Value, `Some` even when zero-length
    pub value: Option<Bytes>,
}

impl Reply {
    /// Reply carrying only a status.
    #[must_use]
    pub fn status(status: ReplyStatus) -> Self {
        Self { status, key: String::new(), value: None }
    }

    /// `Found` reply for `key` with `value`.
    pub fn found(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self { status: ReplyStatus::Found, key: key.into(), value: Some(value.into()) }
    }

    /// Encode into a reply frame for `request_id`.
    ///
    /// `flags` are the session flags negotiated at handshake; the compact
    /// variant drops the key.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ValueTooLarge` if the value exceeds the frame limit
    pub fn to_frame(&self, request_id: u32, flags: FrameFlags) -> Result<Frame> {
        let session = flags.session_bits();
        let mut header = FrameHeader::new(Opcode::Reply);
        header.set_request_id(request_id);
        header.set_status(self.status);
        header.set_flags(session.with(FrameFlags::HAS_VALUE, self.value.is_some()));

        let key = match session.variant() {
            crate::ProtocolVariant::Keyed => self.key.as_bytes(),
            crate::ProtocolVariant::Compact => &[],
        };
        let value = self.value.as_deref().unwrap_or_default();

        Frame::new(header, key, value)
    }

    /// Decode a reply frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedOpcode` for non-reply frames
    /// - `ProtocolError::UnknownStatus` for unknown status bytes
    /// - `ProtocolError::InvalidKey` if the key is not UTF-8
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.header.opcode_enum() != Some(Opcode::Reply) {
            return Err(ProtocolError::UnexpectedOpcode {
                expected: Opcode::Reply,
                actual: frame.header.opcode(),
            });
        }

        let status = ReplyStatus::from_u8(frame.header.status())?;
        let key = std::str::from_utf8(frame.key()).map_err(|_| ProtocolError::InvalidKey)?;
        let value = frame.header.flags().contains(FrameFlags::HAS_VALUE).then(|| frame.value());

        Ok(Self { status, key: key.to_owned(), value })
    }
}

/// Quality-of-service tag pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Qos {
    /// Traffic class
    pub class: u8,
    /// Network path
    pub path: u8,
}

/// Client handshake, the first frame on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Session flags (variant and typed encoding)
    pub flags: FrameFlags,
    /// Fingerprint of the client's trusted CA, present for secure sessions
    pub secure_fingerprint: Option<[u8; 32]>,
    /// QoS tags, present when either tag is non-zero
    pub qos: Option<Qos>,
}

impl Hello {
    /// Encode as a Hello frame.
    ///
    /// # Errors
    ///
    /// Infallible in practice (the payload is at most 32 bytes); the result
    /// mirrors [`Frame::new`].
    pub fn to_frame(&self) -> Result<Frame> {
        let mut header = FrameHeader::new(Opcode::Hello);
        header.set_flags(
            self.flags.session_bits().with(FrameFlags::SECURE, self.secure_fingerprint.is_some()),
        );
        if let Some(qos) = self.qos {
            header.set_qos(qos.class, qos.path);
        }

        let value = self.secure_fingerprint.as_ref().map_or(&[][..], |fp| &fp[..]);
        Frame::new(header, &[], value)
    }

    /// Decode a Hello frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedOpcode` for non-Hello frames
    /// - `ProtocolError::InvalidHello` if a secure Hello lacks a 32-byte
    ///   fingerprint
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.header.opcode_enum() != Some(Opcode::Hello) {
            return Err(ProtocolError::UnexpectedOpcode {
                expected: Opcode::Hello,
                actual: frame.header.opcode(),
            });
        }

        let flags = frame.header.flags();
        let secure_fingerprint = if flags.contains(FrameFlags::SECURE) {
            let value = frame.value();
            let fingerprint: [u8; 32] = value.as_ref().try_into().map_err(|_| {
                ProtocolError::InvalidHello(format!(
                    "secure hello needs a 32-byte fingerprint, got {} bytes",
                    value.len()
                ))
            })?;
            Some(fingerprint)
        } else {
            None
        };

        let qos = Qos { class: frame.header.qos_class(), path: frame.header.qos_path() };
        let qos = (qos != Qos::default()).then_some(qos);

        Ok(Self { flags: flags.session_bits(), secure_fingerprint, qos })
    }

    /// `HelloAck` frame accepting this handshake.
    ///
    /// # Errors
    ///
    /// Mirrors [`Frame::new`]; an empty payload never fails.
    pub fn ack(&self) -> Result<Frame> {
        let mut header = FrameHeader::new(Opcode::HelloAck);
        header.set_flags(
            self.flags.session_bits().with(FrameFlags::SECURE, self.secure_fingerprint.is_some()),
        );
        Frame::new(header, &[], &[])
    }

    /// Whether `frame` is a `HelloAck` for this handshake.
    #[must_use]
    pub fn is_acked_by(&self, frame: &Frame) -> bool {
        frame.header.opcode_enum() == Some(Opcode::HelloAck)
            && frame.header.flags().session_bits() == self.flags.session_bits()
            && frame.header.flags().contains(FrameFlags::SECURE)
                == self.secure_fingerprint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolVariant;

    #[test]
    fn request_frame_round_trip() {
        let request = Request::set("k", &b"v"[..]);
        let frame = request.to_frame(7, FrameFlags::empty()).unwrap();

        assert_eq!(frame.header.request_id(), 7);
        assert_eq!(Request::from_frame(&frame).unwrap(), request);
    }

    #[test]
    fn reply_frame_rejects_request_opcode() {
        let frame = Request::get("k").to_frame(1, FrameFlags::empty()).unwrap();
        assert!(matches!(Reply::from_frame(&frame), Err(ProtocolError::UnexpectedOpcode { .. })));
    }

    #[test]
    fn empty_value_stays_present() {
        let reply = Reply::found("empty", Bytes::new());
        let frame = reply.to_frame(3, FrameFlags::empty()).unwrap();

        let decoded = Reply::from_frame(&frame).unwrap();
        assert_eq!(decoded.value, Some(Bytes::new()));
    }

    #[test]
    fn missing_value_stays_absent() {
        let frame = Reply::status(ReplyStatus::NotFound).to_frame(3, FrameFlags::empty()).unwrap();

        let decoded = Reply::from_frame(&frame).unwrap();
        assert_eq!(decoded.status, ReplyStatus::NotFound);
        assert_eq!(decoded.value, None);
    }

    #[test]
    fn compact_variant_drops_key() {
        let flags = FrameFlags::session(ProtocolVariant::Compact, false);
        let frame = Reply::found("abc", &b"abc"[..]).to_frame(1, flags).unwrap();

        assert_eq!(frame.header.key_size(), 0);
        let decoded = Reply::from_frame(&frame).unwrap();
        assert_eq!(decoded.key, "");
        assert_eq!(decoded.value.as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn status_bytes_round_trip() {
        for status in [
            ReplyStatus::Found,
            ReplyStatus::NotFound,
            ReplyStatus::Stored,
            ReplyStatus::Timeout,
            ReplyStatus::ConnectError,
            ReplyStatus::RemoteError,
            ReplyStatus::LocalError,
        ] {
            assert_eq!(ReplyStatus::from_u8(status.to_u8()), Ok(status));
        }
        assert_eq!(ReplyStatus::from_u8(0), Err(ProtocolError::UnknownStatus(0)));
    }

    #[test]
    fn secure_hello_carries_fingerprint_and_qos() {
        let hello = Hello {
            flags: FrameFlags::session(ProtocolVariant::Keyed, true),
            secure_fingerprint: Some([9u8; 32]),
            qos: Some(Qos { class: 2, path: 1 }),
        };

        let frame = hello.to_frame().unwrap();
        assert_eq!(Hello::from_frame(&frame).unwrap(), hello);
        assert!(hello.is_acked_by(&hello.ack().unwrap()));
    }

    #[test]
    fn secure_hello_without_fingerprint_is_rejected() {
        let mut header = FrameHeader::new(Opcode::Hello);
        header.set_flags(FrameFlags::empty().with(FrameFlags::SECURE, true));
        let frame = Frame::new(header, &[], &[1, 2, 3]).unwrap();

        assert!(matches!(Hello::from_frame(&frame), Err(ProtocolError::InvalidHello(_))));
    }

    #[test]
    fn ack_for_other_session_is_not_accepted() {
        let hello =
            Hello { flags: FrameFlags::empty(), secure_fingerprint: None, qos: None };
        let other = Hello {
            flags: FrameFlags::session(ProtocolVariant::Compact, false),
            secure_fingerprint: None,
            qos: None,
        };

        assert!(!hello.is_acked_by(&other.ack().unwrap()));
    }
}
