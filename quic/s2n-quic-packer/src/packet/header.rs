// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory representation of the headers the packer serializes

use crate::{
    connection::ConnectionId,
    crypto::EncryptionLevel,
    packet::{
        number::{PacketNumberLen, TruncatedPacketNumber},
        Version,
    },
    varint::VarInt,
};
use bytes::Bytes;
use s2n_codec::{Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Header Form:  The most significant bit (0x80) of byte 0 (the first
//#   byte) is set to 1 for long headers.
//#
//# Fixed Bit:  The next bit (0x40) of byte 0 is set to 1.

const LONG_HEADER_FORM: u8 = 0x80;
const FIXED_BIT: u8 = 0x40;

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Long Packet Type:  The next two bits (those with a mask of 0x30)
//#    of byte 0 contain a packet type.

const INITIAL_TYPE: u8 = 0b00 << 4;
const HANDSHAKE_TYPE: u8 = 0b10 << 4;

/// The header of an outgoing packet.
///
/// Long headers pin two encodings so the header's size never changes
/// between budgeting and serialization: the packet number always occupies
/// [`PacketNumberLen::MAX`] bytes, and the Length field always occupies a
/// 2-byte varint (its placeholder value, the max packet size, already
/// needs 2 bytes and no final value is ever larger).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Header {
    Initial {
        version: Version,
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
        /// The retry token; empty for servers and untokened clients
        token: Bytes,
        payload_len: VarInt,
        packet_number: TruncatedPacketNumber,
    },
    Handshake {
        version: Version,
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
        payload_len: VarInt,
        packet_number: TruncatedPacketNumber,
    },
    Short {
        destination_connection_id: ConnectionId,
        packet_number: TruncatedPacketNumber,
    },
}

impl Header {
    #[inline]
    pub fn encryption_level(&self) -> EncryptionLevel {
        match self {
            Self::Initial { .. } => EncryptionLevel::Initial,
            Self::Handshake { .. } => EncryptionLevel::Handshake,
            Self::Short { .. } => EncryptionLevel::OneRtt,
        }
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        !matches!(self, Self::Short { .. })
    }

    #[inline]
    pub fn packet_number(&self) -> TruncatedPacketNumber {
        match self {
            Self::Initial { packet_number, .. }
            | Self::Handshake { packet_number, .. }
            | Self::Short { packet_number, .. } => *packet_number,
        }
    }

    #[inline]
    pub fn packet_number_len(&self) -> PacketNumberLen {
        self.packet_number().len()
    }

    #[inline]
    pub fn destination_connection_id(&self) -> &ConnectionId {
        match self {
            Self::Initial {
                destination_connection_id,
                ..
            }
            | Self::Handshake {
                destination_connection_id,
                ..
            }
            | Self::Short {
                destination_connection_id,
                ..
            } => destination_connection_id,
        }
    }

    /// Sets the long-header Length field.
    ///
    /// The value covers the packet number, the payload and the
    /// authentication tag. No-op on short headers, which carry no Length.
    #[inline]
    pub fn set_payload_len(&mut self, len: usize) {
        debug_assert!(len < 1 << 14, "Length must keep its 2-byte encoding");
        match self {
            Self::Initial { payload_len, .. } | Self::Handshake { payload_len, .. } => {
                *payload_len = VarInt::from_u16(len as u16);
            }
            Self::Short { .. } => {}
        }
    }

    #[inline]
    fn first_byte(&self) -> u8 {
        let pn_mask = self.packet_number_len().into_packet_tag_mask();
        match self {
            Self::Initial { .. } => LONG_HEADER_FORM | FIXED_BIT | INITIAL_TYPE | pn_mask,
            Self::Handshake { .. } => LONG_HEADER_FORM | FIXED_BIT | HANDSHAKE_TYPE | pn_mask,
            Self::Short { .. } => FIXED_BIT | pn_mask,
        }
    }
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Long Header Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2),
//#   Type-Specific Bits (4),
//#   Version (32),
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..160),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..160),
//# }

#[inline]
fn encode_long_prefix<E: Encoder>(
    first_byte: u8,
    version: Version,
    destination_connection_id: &ConnectionId,
    source_connection_id: &ConnectionId,
    encoder: &mut E,
) {
    encoder.encode(&first_byte);
    encoder.encode(&version);
    encoder.encode(&(destination_connection_id.len() as u8));
    encoder.encode(destination_connection_id);
    encoder.encode(&(source_connection_id.len() as u8));
    encoder.encode(source_connection_id);
}

/// Writes the Length field with its 2-byte encoding regardless of value
#[inline]
fn encode_pinned_len<E: Encoder>(payload_len: VarInt, encoder: &mut E) {
    debug_assert!(payload_len.as_u64() < 1 << 14);
    encoder.encode(&(payload_len.as_u64() as u16 | (0b01u16 << 14)));
}

impl EncoderValue for Header {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        match self {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.2
            //# Initial Packet {
            //#   Header Form (1) = 1,
            //#   Fixed Bit (1) = 1,
            //#   Long Packet Type (2) = 0,
            //#   Reserved Bits (2),
            //#   Packet Number Length (2),
            //#   Version (32),
            //#   Destination Connection ID Length (8),
            //#   Destination Connection ID (0..160),
            //#   Source Connection ID Length (8),
            //#   Source Connection ID (0..160),
            //#   Token Length (i),
            //#   Token (..),
            //#   Length (i),
            //#   Packet Number (8..32),
            //#   Packet Payload (..),
            //# }
            Self::Initial {
                version,
                destination_connection_id,
                source_connection_id,
                token,
                payload_len,
                packet_number,
            } => {
                encode_long_prefix(
                    self.first_byte(),
                    *version,
                    destination_connection_id,
                    source_connection_id,
                    encoder,
                );
                encoder.encode_with_len_prefix::<VarInt, _>(token);
                encode_pinned_len(*payload_len, encoder);
                encoder.encode(packet_number);
            }
            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.4
            //# A Handshake packet uses long headers with a type value of 0x2,
            //# followed by the Length and Packet Number fields
            Self::Handshake {
                version,
                destination_connection_id,
                source_connection_id,
                payload_len,
                packet_number,
            } => {
                encode_long_prefix(
                    self.first_byte(),
                    *version,
                    destination_connection_id,
                    source_connection_id,
                    encoder,
                );
                encode_pinned_len(*payload_len, encoder);
                encoder.encode(packet_number);
            }
            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.3.1
            //# 1-RTT Packet {
            //#   Header Form (1) = 0,
            //#   Fixed Bit (1) = 1,
            //#   Spin Bit (1),
            //#   Reserved Bits (2),
            //#   Key Phase (1),
            //#   Packet Number Length (2),
            //#   Destination Connection ID (0..160),
            //#   Packet Number (8..32),
            //#   Packet Payload (..),
            //# }
            Self::Short {
                destination_connection_id,
                packet_number,
            } => {
                encoder.encode(&self.first_byte());
                encoder.encode(destination_connection_id);
                encoder.encode(packet_number);
            }
        }
    }
}
