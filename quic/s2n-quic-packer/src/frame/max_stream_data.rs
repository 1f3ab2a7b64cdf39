// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.10
//# A MAX_STREAM_DATA frame (type=0x11) is used in flow control to inform
//# a peer of the maximum amount of data that can be sent on a stream.

pub(crate) const MAX_STREAM_DATA_TAG: Tag = 0x11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    /// The stream ID of the affected stream
    pub stream_id: VarInt,

    /// The maximum amount of data that can be sent on the stream, in
    /// units of bytes
    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    #[inline]
    pub const fn tag(&self) -> Tag {
        MAX_STREAM_DATA_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (stream_id, buffer) = buffer.decode()?;
        let (maximum_stream_data, buffer) = buffer.decode()?;

        let frame = MaxStreamData {
            stream_id,
            maximum_stream_data,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for MaxStreamData {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_id);
        encoder.encode(&self.maximum_stream_data);
    }
}
