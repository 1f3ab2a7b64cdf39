// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
//# Receivers send ACK frames (types 0x02 and 0x03) to inform senders of
//# packets they have received and processed.

// The ECN-counting variant (0x03) is produced by the receive path, which is
// out of scope here; the ACK generator only hands the packer type 0x02.
pub(crate) const ACK_TAG: Tag = 0x02;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
//# ACK Frame {
//#   Type (i) = 0x02..0x03,
//#   Largest Acknowledged (i),
//#   ACK Delay (i),
//#   ACK Range Count (i),
//#   First ACK Range (i),
//#   ACK Range (..) ...,
//#   [ECN Counts (..)],
//# }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    /// The largest packet number the peer is acknowledging
    pub largest_acknowledged: VarInt,

    /// The acknowledgement delay in microseconds, already scaled by the
    /// ack_delay_exponent
    pub ack_delay: VarInt,

    /// The number of contiguous packets preceding the Largest Acknowledged
    /// that are being acknowledged
    pub first_ack_range: VarInt,

    /// Additional ranges of acknowledged packets, in descending packet
    /// number order
    pub ack_ranges: Vec<AckRange>,
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3.1
//# Each ACK Range consists of alternating Gap and ACK Range Length
//# values in descending packet number order.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckRange {
    pub gap: VarInt,
    pub len: VarInt,
}

impl Ack {
    #[inline]
    pub const fn tag(&self) -> Tag {
        ACK_TAG
    }

    /// Acknowledges the single packet number `largest`
    pub fn for_largest(largest: VarInt) -> Self {
        Self {
            largest_acknowledged: largest,
            ack_delay: VarInt::ZERO,
            first_ack_range: VarInt::ZERO,
            ack_ranges: Vec::new(),
        }
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (largest_acknowledged, buffer) = buffer.decode()?;
        let (ack_delay, buffer) = buffer.decode()?;
        let (range_count, buffer) = buffer.decode::<VarInt>()?;
        let (first_ack_range, mut buffer) = buffer.decode()?;

        let mut ack_ranges = Vec::new();
        for _ in 0..range_count.as_u64() {
            let (gap, remaining) = buffer.decode()?;
            let (len, remaining) = remaining.decode()?;
            ack_ranges.push(AckRange { gap, len });
            buffer = remaining;
        }

        let frame = Ack {
            largest_acknowledged,
            ack_delay,
            first_ack_range,
            ack_ranges,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for Ack {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.largest_acknowledged);
        encoder.encode(&self.ack_delay);
        encoder.encode(&VarInt::try_from(self.ack_ranges.len()).unwrap_or(VarInt::MAX));
        encoder.encode(&self.first_ack_range);
        for range in &self.ack_ranges {
            encoder.encode(&range.gap);
            encoder.encode(&range.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use s2n_codec::{DecoderBuffer, EncoderBuffer};

    #[test]
    fn round_trip_test() {
        let frame = Ack {
            largest_acknowledged: VarInt::from_u32(1000),
            ack_delay: VarInt::from_u8(40),
            first_ack_range: VarInt::from_u8(3),
            ack_ranges: vec![
                AckRange {
                    gap: VarInt::from_u8(2),
                    len: VarInt::from_u8(5),
                },
                AckRange {
                    gap: VarInt::ZERO,
                    len: VarInt::from_u32(100),
                },
            ],
        };

        let mut bytes = [0u8; 64];
        let len = {
            let mut encoder = EncoderBuffer::new(&mut bytes);
            encoder.encode(&frame);
            encoder.len()
        };
        assert_eq!(len, frame.encoding_size());

        let (decoded, remaining) = Frame::decode(DecoderBuffer::new(&bytes[..len])).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(decoded, Frame::Ack(frame));
    }

    #[test]
    fn minimum_size_test() {
        // the smallest possible ACK still spends five bytes
        assert_eq!(Ack::for_largest(VarInt::ZERO).encoding_size(), 5);
    }
}
