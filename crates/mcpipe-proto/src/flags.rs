//! Header flag bits and the protocol variant selector.

/// Frame flag bitfield.
///
/// | bit  | meaning                                       |
/// |------|-----------------------------------------------|
/// | 0x01 | typed encoding requested by the client        |
/// | 0x02 | secure channel (Hello / `HelloAck` only)      |
/// | 0x04 | reply carries a value (possibly zero-length)  |
/// | 0x08 | compact variant: replies omit the key         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Typed encoding
    pub const TYPED: u8 = 0x01;
    /// Secure channel
    pub const SECURE: u8 = 0x02;
    /// Value present
    pub const HAS_VALUE: u8 = 0x04;
    /// Compact variant
    pub const COMPACT: u8 = 0x08;

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Flags from the raw header byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw header byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Whether every bit in `bits` is set.
    #[must_use]
    pub const fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    /// Copy with `bits` set or cleared.
    #[must_use]
    pub const fn with(self, bits: u8, enabled: bool) -> Self {
        if enabled { Self(self.0 | bits) } else { Self(self.0 & !bits) }
    }

    /// Protocol variant encoded in these flags.
    #[must_use]
    pub const fn variant(self) -> ProtocolVariant {
        if self.contains(Self::COMPACT) { ProtocolVariant::Compact } else { ProtocolVariant::Keyed }
    }

    /// Whether typed encoding is requested.
    #[must_use]
    pub const fn typed(self) -> bool {
        self.contains(Self::TYPED)
    }

    /// Flags describing a session's variant and encoding.
    #[must_use]
    pub const fn session(variant: ProtocolVariant, typed: bool) -> Self {
        Self::empty()
            .with(Self::COMPACT, matches!(variant, ProtocolVariant::Compact))
            .with(Self::TYPED, typed)
    }

    /// Only the bits that describe the session (variant and typed).
    #[must_use]
    pub const fn session_bits(self) -> Self {
        Self(self.0 & (Self::COMPACT | Self::TYPED))
    }
}

/// Protocol variant selected by the client at handshake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ProtocolVariant {
    /// Replies carry the request key alongside the value.
    #[default]
    Keyed,
    /// Replies carry the value only.
    Compact,
}
