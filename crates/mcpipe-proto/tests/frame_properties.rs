//! Property-based tests for frame decoding.
//!
//! Decoding must never panic on arbitrary input, and back-to-back frames in
//! one buffer must decode one after another using only header sizes.

use bytes::Bytes;
use mcpipe_proto::{
    Frame, FrameFlags, FrameHeader, ProtocolVariant, Reply, ReplyStatus, Request,
};
use proptest::prelude::*;

/// Strategy for printable keys within the protocol limit
fn arbitrary_key() -> impl Strategy<Value = String> {
    "[a-z0-9:_]{1,64}"
}

fn arbitrary_variant() -> impl Strategy<Value = ProtocolVariant> {
    prop_oneof![Just(ProtocolVariant::Keyed), Just(ProtocolVariant::Compact)]
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes);
    }

    #[test]
    fn pipelined_frames_split_on_header_sizes(
        keys in prop::collection::vec(arbitrary_key(), 1..16),
        variant in arbitrary_variant(),
        typed in any::<bool>(),
    ) {
        let flags = FrameFlags::session(variant, typed);
        let mut wire = Vec::new();
        for (id, key) in keys.iter().enumerate() {
            let reply = Reply::found(key.clone(), Bytes::from(key.clone()));
            reply.to_frame(id as u32, flags).expect("should encode").encode(&mut wire);
        }

        let mut offset = 0;
        for (id, key) in keys.iter().enumerate() {
            let frame = Frame::decode(&wire[offset..]).expect("should decode");
            offset += frame.encoded_len();

            let reply = Reply::from_frame(&frame).expect("should parse reply");
            prop_assert_eq!(frame.header.request_id(), id as u32);
            prop_assert_eq!(frame.header.flags().session_bits(), flags);
            prop_assert_eq!(reply.status, ReplyStatus::Found);
            prop_assert_eq!(reply.value.as_deref(), Some(key.as_bytes()));
            match variant {
                ProtocolVariant::Keyed => prop_assert_eq!(&reply.key, key),
                ProtocolVariant::Compact => prop_assert!(reply.key.is_empty()),
            }
        }
        prop_assert_eq!(offset, wire.len());
    }

    #[test]
    fn set_request_keeps_value(key in arbitrary_key(), value in prop::collection::vec(any::<u8>(), 0..512)) {
        let request = Request::set(key, value.clone());
        let frame = request.to_frame(1, FrameFlags::empty()).expect("should encode");

        prop_assert_eq!(frame.header.payload_size(), request.key.len() + value.len());
        let decoded = Request::from_frame(&frame).expect("should decode");
        prop_assert_eq!(decoded.value.as_deref(), Some(&value[..]));
    }
}

#[test]
fn header_size_is_fixed() {
    assert_eq!(FrameHeader::SIZE, 20);
}
