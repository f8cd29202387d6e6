//! Frame type combining header and payload.
//!
//! Layout on the wire: `[FrameHeader: 20 bytes] + [key] + [value]`.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame (transport layer)
///
/// Holds raw bytes; typed messages are built with [`crate::Request`],
/// [`crate::Reply`] and [`crate::Hello`].
///
/// # Invariants
///
/// - `payload.len() == header.payload_size()`, with the first
///   `header.key_size()` bytes being the key. Enforced by [`Frame::new`] and
///   verified by [`Frame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Key bytes followed by value bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, setting the header's size fields from `key` and
    /// `value`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::KeyTooLarge` / `ValueTooLarge` if either part exceeds
    ///   the header limits
    pub fn new(mut header: FrameHeader, key: &[u8], value: &[u8]) -> Result<Self> {
        let key_size = u16::try_from(key.len())
            .ok()
            .filter(|size| *size <= FrameHeader::MAX_KEY_SIZE)
            .ok_or(ProtocolError::KeyTooLarge {
                size: key.len(),
                max: FrameHeader::MAX_KEY_SIZE as usize,
            })?;

        let value_size = u32::try_from(value.len())
            .ok()
            .filter(|size| *size <= FrameHeader::MAX_VALUE_SIZE)
            .ok_or(ProtocolError::ValueTooLarge {
                size: value.len(),
                max: FrameHeader::MAX_VALUE_SIZE as usize,
            })?;

        header.key_size = key_size.to_be_bytes();
        header.value_size = value_size.to_be_bytes();

        let mut payload = Vec::with_capacity(key.len() + value.len());
        payload.extend_from_slice(key);
        payload.extend_from_slice(value);

        Ok(Self { header, payload: Bytes::from(payload) })
    }

    /// Key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.payload[..self.header.key_size() as usize]
    }

    /// Value bytes (shares the payload buffer).
    #[must_use]
    pub fn value(&self) -> Bytes {
        self.payload.slice(self.header.key_size() as usize..)
    }

    /// Encode frame into buffer
    ///
    /// Writes `[header] + [payload]`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert_eq!(self.payload.len(), self.header.payload_size());

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
    }

    /// Encoded length in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Decode frame from wire format
    ///
    /// Trailing bytes beyond the frame are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if header parsing fails
    /// - `ProtocolError::FrameTruncated` if fewer payload bytes are present
    ///   than the header claims
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;
        let payload_size = header.payload_size();
        let total_size = FrameHeader::SIZE + payload_size;

        let Some(payload) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    #[test]
    fn frame_sets_sizes() {
        let frame = Frame::new(FrameHeader::new(Opcode::Set), b"key", b"value").unwrap();

        assert_eq!(frame.header.key_size(), 3);
        assert_eq!(frame.header.value_size(), 5);
        assert_eq!(frame.key(), b"key");
        assert_eq!(&frame.value()[..], b"value");
    }

    #[test]
    fn encode_then_decode_preserves_parts() {
        let frame = Frame::new(FrameHeader::new(Opcode::Get), b"k", b"").unwrap();

        let mut wire = Vec::new();
        frame.encode(&mut wire);
        assert_eq!(wire.len(), frame.encoded_len());

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(FrameHeader::new(Opcode::Reply), b"", &[7u8; 100]).unwrap();
        let header_bytes = frame.header.to_bytes();

        let result = Frame::decode(&header_bytes);
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 0 }));
    }

    #[test]
    fn reject_oversized_key() {
        let key = vec![b'k'; FrameHeader::MAX_KEY_SIZE as usize + 1];
        let result = Frame::new(FrameHeader::new(Opcode::Get), &key, b"");
        assert!(matches!(result, Err(ProtocolError::KeyTooLarge { size: 251, .. })));
    }

    #[test]
    fn max_value_is_accepted() {
        let value = vec![0u8; FrameHeader::MAX_VALUE_SIZE as usize];
        assert!(Frame::new(FrameHeader::new(Opcode::Set), b"big", &value).is_ok());

        let value = vec![0u8; FrameHeader::MAX_VALUE_SIZE as usize + 1];
        assert!(matches!(
            Frame::new(FrameHeader::new(Opcode::Set), b"big", &value),
            Err(ProtocolError::ValueTooLarge { .. })
        ));
    }
}
