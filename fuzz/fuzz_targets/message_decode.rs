//! Fuzz target for typed message decoding
//!
//! Valid frames with arbitrary header fields and payloads are decoded as
//! each message type. Decoding may fail but must never panic, and a decoded
//! request must encode back to an equal request.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mcpipe_proto::{Frame, FrameFlags, FrameHeader, Hello, Opcode, Reply, Request};

#[derive(Debug, Arbitrary)]
struct Input {
    opcode: OpcodeChoice,
    flags: u8,
    request_id: u32,
    key: Vec<u8>,
    value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum OpcodeChoice {
    Hello,
    HelloAck,
    Get,
    Set,
    Reply,
}

impl OpcodeChoice {
    fn opcode(self) -> Opcode {
        match self {
            Self::Hello => Opcode::Hello,
            Self::HelloAck => Opcode::HelloAck,
            Self::Get => Opcode::Get,
            Self::Set => Opcode::Set,
            Self::Reply => Opcode::Reply,
        }
    }
}

fuzz_target!(|input: Input| {
    let mut header = FrameHeader::new(input.opcode.opcode());
    header.set_flags(FrameFlags::from_byte(input.flags));
    header.set_request_id(input.request_id);

    let Ok(frame) = Frame::new(header, &input.key, &input.value) else {
        return;
    };

    let _ = Hello::from_frame(&frame);
    let _ = Reply::from_frame(&frame);

    if let Ok(request) = Request::from_frame(&frame) {
        let flags = frame.header.flags().session_bits();
        if let Ok(encoded) = request.to_frame(input.request_id, flags) {
            assert_eq!(Request::from_frame(&encoded).ok(), Some(request));
        }
    }
});
