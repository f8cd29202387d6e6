//! Frame opcodes.

/// Operation code carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Client handshake, first frame on every connection
    Hello = 0x01,
    /// Server accepts the handshake
    HelloAck = 0x02,
    /// Get request
    Get = 0x10,
    /// Set request
    Set = 0x11,
    /// Reply to a Get or Set
    Reply = 0x20,
}

impl Opcode {
    /// Raw opcode byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Opcode from its raw byte. `None` if unrecognized.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::HelloAck),
            0x10 => Some(Self::Get),
            0x11 => Some(Self::Set),
            0x20 => Some(Self::Reply),
            _ => None,
        }
    }
}
