// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{max_streams::StreamType, Tag},
    varint::VarInt,
};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.14
//# A sender SHOULD send a STREAMS_BLOCKED frame (type=0x16 or 0x17) when
//# it wishes to open a stream but is unable to do so due to the maximum
//# stream limit set by its peer.

pub(crate) const STREAMS_BLOCKED_BIDI_TAG: Tag = 0x16;
pub(crate) const STREAMS_BLOCKED_UNI_TAG: Tag = 0x17;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamsBlocked {
    pub stream_type: StreamType,

    /// The maximum number of streams allowed at the time the frame was
    /// sent
    pub stream_limit: VarInt,
}

impl StreamsBlocked {
    #[inline]
    pub const fn tag(&self) -> Tag {
        match self.stream_type {
            StreamType::Bidirectional => STREAMS_BLOCKED_BIDI_TAG,
            StreamType::Unidirectional => STREAMS_BLOCKED_UNI_TAG,
        }
    }

    pub(crate) fn decode(tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let stream_type = if tag == STREAMS_BLOCKED_BIDI_TAG {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        };
        let (stream_limit, buffer) = buffer.decode()?;

        let frame = StreamsBlocked {
            stream_type,
            stream_limit,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for StreamsBlocked {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_limit);
    }
}
