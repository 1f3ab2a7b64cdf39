// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::VarInt;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
//# *  Initial space: All Initial packets (Section 17.2.2) are in this
//#    space.
//#
//# *  Handshake space: All Handshake packets (Section 17.2.4) are in
//#    this space.
//#
//# *  Application data space: All 0-RTT (Section 17.2.3) and 1-RTT
//#    (Section 17.3) encrypted packets are in this space.

/// Contains all of the available packet spaces for QUIC packets
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketNumberSpace {
    #[default]
    Initial,
    Handshake,
    ApplicationData,
}

impl PacketNumberSpace {
    /// Returns `true` if the `PacketNumberSpace` is set to `Initial`
    #[inline]
    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    /// Returns `true` if the `PacketNumberSpace` is set to `Handshake`
    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    /// Returns `true` if the `PacketNumberSpace` is set to `ApplicationData`
    #[inline]
    pub fn is_application_data(self) -> bool {
        matches!(self, Self::ApplicationData)
    }
}

/// The packet number len is the two least significant bits of the packet tag
pub(crate) const PACKET_NUMBER_LEN_MASK: u8 = 0b11;

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
//# Packet numbers are integers in the range 0 to 2^62-1 (Section 12.3).
//# When present in long or short packet headers, they are encoded in 1
//# to 4 bytes.

/// The number of bytes a packet number occupies on the wire.
///
/// The packet-number manager hands out the minimum encoding able to
/// disambiguate a number from the packets the peer already acknowledged;
/// the send path only ever produces 1, 2 or 4 byte encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketNumberLen {
    Len1,
    Len2,
    Len4,
}

impl PacketNumberLen {
    /// The largest encoding; long headers always use it so the header
    /// never shrinks between sizing and serialization
    pub const MAX: Self = Self::Len4;

    /// Returns the bytesize required for encoding the given `PacketNumberLen`
    #[inline]
    pub fn bytesize(self) -> usize {
        match self {
            Self::Len1 => 1,
            Self::Len2 => 2,
            Self::Len4 => 4,
        }
    }

    /// Returns a packet tag mask for the given `PacketNumberLen`
    #[inline]
    pub fn into_packet_tag_mask(self) -> u8 {
        (self.bytesize() - 1) as u8
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
    //# Packet Number Length:  The least significant two bits (those with a
    //#    mask of 0x03) of byte 0 contain the length of the Packet Number
    //#    field, encoded as an unsigned two-bit integer that is one less
    //#    than the length of the Packet Number field in bytes.

    /// Reads the `PacketNumberLen` back out of an unprotected packet tag
    #[inline]
    pub fn from_packet_tag(tag: u8) -> Option<Self> {
        match tag & PACKET_NUMBER_LEN_MASK {
            0b00 => Some(Self::Len1),
            0b01 => Some(Self::Len2),
            0b11 => Some(Self::Len4),
            _ => None,
        }
    }

    #[inline]
    fn max_value(self) -> u64 {
        match self {
            Self::Len1 => (1 << 8) - 1,
            Self::Len2 => (1 << 16) - 1,
            Self::Len4 => (1 << 32) - 1,
        }
    }
}

/// The least significant bytes of a packet number, as they appear on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TruncatedPacketNumber {
    value: u32,
    len: PacketNumberLen,
}

impl TruncatedPacketNumber {
    /// Truncates `packet_number` to its `len` least significant bytes
    #[inline]
    pub fn new(packet_number: VarInt, len: PacketNumberLen) -> Self {
        Self {
            value: (packet_number.as_u64() & len.max_value()) as u32,
            len,
        }
    }

    #[inline]
    pub fn len(self) -> PacketNumberLen {
        self.len
    }

    #[inline]
    pub fn into_u32(self) -> u32 {
        self.value
    }

    /// Decodes a `TruncatedPacketNumber` of the given `len`
    #[inline]
    pub fn decode(buffer: DecoderBuffer<'_>, len: PacketNumberLen) -> DecoderBufferResult<'_, Self> {
        let (bytes, buffer) = buffer.decode_slice(len.bytesize())?;
        let mut value = 0u32;
        for byte in bytes.into_less_safe_slice() {
            value = value << 8 | *byte as u32;
        }
        Ok((Self { value, len }, buffer))
    }
}

impl EncoderValue for TruncatedPacketNumber {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let len = self.len.bytesize();
        let bytes = self.value.to_be_bytes();
        encoder.write_slice(&bytes[bytes.len() - len..]);
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.len.bytesize()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        self.len.bytesize()
    }
}
