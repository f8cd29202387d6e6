//! Fuzz target for Frame::decode
//!
//! Arbitrary byte sequences must never panic the decoder. Anything that does
//! decode must re-encode to the bytes it came from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mcpipe_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let mut encoded = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut encoded);
    assert_eq!(&encoded[..], &data[..encoded.len()], "re-encoding changed the frame");
});
