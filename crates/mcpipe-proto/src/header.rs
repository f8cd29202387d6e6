//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 20-byte structure serialized as raw binary
//! (Big Endian). Correlation (request id), routing (opcode) and sizing fit in
//! the header so a reader can size its buffer before touching the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    FrameFlags, Opcode, ReplyStatus,
    errors::{ProtocolError, Result},
};

/// Fixed 20-byte frame header (Big Endian network byte order)
///
/// Multi-byte integers are stored as raw byte arrays to avoid alignment
/// issues, so every 20-byte pattern is a valid value of this type.
///
/// # Invariants
///
/// - `key_size() <= MAX_KEY_SIZE` and `value_size() <= MAX_VALUE_SIZE` for
///   every header returned by [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    // Protocol identification (8 bytes: 0-7)
    magic: [u8; 4], // 0x4D435051 ("MCPQ" in ASCII)
    version: u8,    // 0x01
    flags: u8,      // FrameFlags bitfield
    opcode: u8,     // Opcode
    status: u8,     // ReplyStatus, 0 for requests

    // Correlation (4 bytes: 8-11)
    request_id: [u8; 4], // u32 client-assigned id

    // Quality of service (2 bytes: 12-13)
    qos_class: u8,
    qos_path: u8,

    // Payload sizes (6 bytes: 14-19)
    pub(crate) key_size: [u8; 2],   // u16
    pub(crate) value_size: [u8; 4], // u32
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 20;

    /// Magic number: "MCPQ" in ASCII
    pub const MAGIC: u32 = 0x4D43_5051;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum key size, as in memcache
    pub const MAX_KEY_SIZE: u16 = 250;

    /// Maximum value size (16 MiB)
    pub const MAX_VALUE_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a new header with the specified opcode.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&Self::MAGIC.to_be_bytes());
        bytes[4] = Self::VERSION;
        bytes[6] = opcode.to_u8();

        Self::from_bytes(&bytes)
            .ok()
            .unwrap_or_else(|| unreachable!("constructed valid header with correct magic/version"))
            .to_owned()
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than
    ///   [`Self::SIZE`]
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if the version is unknown
    /// - `ProtocolError::KeyTooLarge` / `ValueTooLarge` if a size field exceeds
    ///   its maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let key_size = u16::from_be_bytes(header.key_size);
        if key_size > Self::MAX_KEY_SIZE {
            return Err(ProtocolError::KeyTooLarge {
                size: key_size as usize,
                max: Self::MAX_KEY_SIZE as usize,
            });
        }

        let value_size = u32::from_be_bytes(header.value_size);
        if value_size > Self::MAX_VALUE_SIZE {
            return Err(ProtocolError::ValueTooLarge {
                size: value_size as usize,
                max: Self::MAX_VALUE_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Frame flags.
    #[must_use]
    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_byte(self.flags)
    }

    /// Operation code as raw byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Raw reply status byte (0 for requests).
    #[must_use]
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Client-assigned id for request/reply correlation.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        u32::from_be_bytes(self.request_id)
    }

    /// QoS class tag.
    #[must_use]
    pub fn qos_class(&self) -> u8 {
        self.qos_class
    }

    /// QoS path tag.
    #[must_use]
    pub fn qos_path(&self) -> u8 {
        self.qos_path
    }

    /// Key length in bytes.
    #[must_use]
    pub fn key_size(&self) -> u16 {
        u16::from_be_bytes(self.key_size)
    }

    /// Value length in bytes.
    #[must_use]
    pub fn value_size(&self) -> u32 {
        u32::from_be_bytes(self.value_size)
    }

    /// Total payload length (key + value).
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.key_size() as usize + self.value_size() as usize
    }

    /// Update frame flags.
    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.flags = flags.to_byte();
    }

    /// Set the reply status.
    pub fn set_status(&mut self, status: ReplyStatus) {
        self.status = status.to_u8();
    }

    /// Set client request id.
    pub fn set_request_id(&mut self, request_id: u32) {
        self.request_id = request_id.to_be_bytes();
    }

    /// Set QoS tags.
    pub fn set_qos(&mut self, class: u8, path: u8) {
        self.qos_class = class;
        self.qos_path = path;
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("flags", &self.flags())
            .field("opcode", &format!("{:#04x}", self.opcode()))
            .field("status", &self.status())
            .field("request_id", &self.request_id())
            .field("qos", &(self.qos_class(), self.qos_path()))
            .field("key_size", &self.key_size())
            .field("value_size", &self.value_size())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}
