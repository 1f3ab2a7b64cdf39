// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.13
//# A sender SHOULD send a STREAM_DATA_BLOCKED frame (type=0x15) when it
//# wishes to send data, but is unable to do so due to stream-level flow
//# control.

pub(crate) const STREAM_DATA_BLOCKED_TAG: Tag = 0x15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDataBlocked {
    /// The stream that is blocked due to flow control
    pub stream_id: VarInt,

    /// The offset of the stream at which the blocking occurred
    pub stream_data_limit: VarInt,
}

impl StreamDataBlocked {
    #[inline]
    pub const fn tag(&self) -> Tag {
        STREAM_DATA_BLOCKED_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (stream_id, buffer) = buffer.decode()?;
        let (stream_data_limit, buffer) = buffer.decode()?;

        let frame = StreamDataBlocked {
            stream_id,
            stream_data_limit,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for StreamDataBlocked {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_id);
        encoder.encode(&self.stream_data_limit);
    }
}
