// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{FitError, Tag},
    varint::VarInt,
};
use bytes::Bytes;
use core::{convert::TryFrom, mem::size_of};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
//# STREAM frames implicitly create a stream and carry stream data.  The
//# Type field in the STREAM frame takes the form 0b00001XXX (or the set
//# of values from 0x08 to 0x0f).

pub(crate) const STREAM_TAG: Tag = 0x08;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
//# *  The OFF bit (0x04) in the frame type is set to indicate that there
//#    is an Offset field present.

pub(crate) const OFF_BIT: Tag = 0x04;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
//# *  The LEN bit (0x02) in the frame type is set to indicate that there
//#    is a Length field present.  If this bit is set to 0, the Length
//#    field is absent and the Stream Data field extends to the end of
//#    the packet.

pub(crate) const LEN_BIT: Tag = 0x02;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
//# *  The FIN bit (0x01) indicates that the frame marks the end of the
//#    stream.

pub(crate) const FIN_BIT: Tag = 0x01;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
//# STREAM Frame {
//#   Type (i) = 0x08..0x0f,
//#   Stream ID (i),
//#   [Offset (i)],
//#   [Length (i)],
//#   Stream Data (..),
//# }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stream {
    /// A variable-length integer indicating the stream ID of the stream
    pub stream_id: VarInt,

    /// A variable-length integer specifying the byte offset in the
    /// stream for the data in this STREAM frame.
    pub offset: VarInt,

    /// If true, the frame is the last frame in the payload: its Length
    /// field is elided and the data extends to the end of the packet
    pub is_last_frame: bool,

    /// If true, the frame marks the end of the stream.
    pub is_fin: bool,

    /// The bytes from the designated stream to be delivered.
    pub data: Bytes,
}

impl Stream {
    #[inline]
    pub fn tag(&self) -> Tag {
        let mut tag = STREAM_TAG;

        if self.offset != 0u64 {
            tag |= OFF_BIT;
        }

        if !self.is_last_frame {
            tag |= LEN_BIT;
        }

        if self.is_fin {
            tag |= FIN_BIT;
        }

        tag
    }

    /// Tries to fit the frame into the provided capacity, sizing the frame
    /// as if its Length field were present.
    ///
    /// If ok, the new payload length is returned, otherwise the frame cannot
    /// fit.
    #[inline]
    pub fn try_fit(&self, capacity: usize) -> Result<usize, FitError> {
        let remaining_capacity = capacity.checked_sub(self.fixed_len()).ok_or(FitError)?;

        let data_len = self.data.len();
        let max_data_len = remaining_capacity.min(data_len);

        let len_prefix_size = VarInt::try_from(max_data_len)
            .map_err(|_| FitError)?
            .encoding_size();

        let prefixed_data_len = remaining_capacity
            .checked_sub(len_prefix_size)
            .ok_or(FitError)?;
        let data_len = prefixed_data_len.min(data_len);

        Ok(data_len)
    }

    /// Splits off a frame carrying the first bytes of this frame's data so
    /// that the split-off frame fits within `capacity`, Length field
    /// included.
    ///
    /// Returns `None` when the whole frame already fits; `self` then
    /// serializes unchanged. After a split, `self` holds the remainder at
    /// the advanced offset and keeps the FIN bit. Callers are expected to
    /// leave enough capacity for the frame header plus at least one data
    /// byte, otherwise no split happens and the remainder stays whole.
    pub fn split_off(&mut self, capacity: usize) -> Option<Stream> {
        debug_assert!(!self.is_last_frame, "split frames are sized with Length");

        if self.encoding_size() <= capacity {
            return None;
        }

        let data_len = self.try_fit(capacity).ok()?;
        if data_len == 0 {
            return None;
        }
        debug_assert!(data_len < self.data.len());

        let offset = self.offset.checked_add_usize(data_len)?;
        let first = Stream {
            stream_id: self.stream_id,
            offset: self.offset,
            is_last_frame: false,
            is_fin: false,
            data: self.data.split_to(data_len),
        };
        self.offset = offset;

        Some(first)
    }

    #[inline]
    fn fixed_len(&self) -> usize {
        let mut fixed_len = 0;
        fixed_len += size_of::<Tag>();
        fixed_len += self.stream_id.encoding_size();

        if self.offset != 0u64 {
            fixed_len += self.offset.encoding_size();
        }

        fixed_len
    }

    pub(crate) fn decode(tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let has_offset = tag & OFF_BIT == OFF_BIT;
        let is_last_frame = tag & LEN_BIT != LEN_BIT;
        let is_fin = tag & FIN_BIT == FIN_BIT;

        let (stream_id, buffer) = buffer.decode()?;

        let (offset, buffer) = if has_offset {
            buffer.decode()?
        } else {
            (Default::default(), buffer)
        };

        let (data, buffer) = if is_last_frame {
            let len = buffer.len();
            buffer.decode_slice(len)?
        } else {
            let (len, buffer) = buffer.decode::<VarInt>()?;
            buffer.decode_slice(len.as_u64() as usize)?
        };
        let data = Bytes::copy_from_slice(data.into_less_safe_slice());

        let frame = Stream {
            stream_id,
            offset,
            is_last_frame,
            is_fin,
            data,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for Stream {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_id);

        if self.offset != 0u64 {
            encoder.encode(&self.offset);
        }

        if self.is_last_frame {
            encoder.encode(&self.data);
        } else {
            encoder.encode_with_len_prefix::<VarInt, _>(&self.data);
        }
    }

    /// We hand optimize this encoding size so we can quickly estimate
    /// how large a STREAM frame will be
    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        let mut len = self.fixed_len();

        let data_len = self.data.len();
        len += data_len;

        // include the len prefix
        if !self.is_last_frame {
            len += VarInt::try_from(data_len).unwrap_or(VarInt::MAX).encoding_size();
        }

        len
    }
}
