// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.11
//# A MAX_STREAMS frame (type=0x12 or 0x13) informs the peer of the
//# cumulative number of streams of a given type it is permitted to open.
//# A MAX_STREAMS frame with a type of 0x12 applies to bidirectional
//# streams, and a MAX_STREAMS frame with a type of 0x13 applies to
//# unidirectional streams.

pub(crate) const MAX_STREAMS_BIDI_TAG: Tag = 0x12;
pub(crate) const MAX_STREAMS_UNI_TAG: Tag = 0x13;

/// The stream type a streams-limit frame applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxStreams {
    pub stream_type: StreamType,

    /// A count of the cumulative number of streams of the corresponding
    /// type that can be opened over the lifetime of the connection
    pub maximum_streams: VarInt,
}

impl MaxStreams {
    #[inline]
    pub const fn tag(&self) -> Tag {
        match self.stream_type {
            StreamType::Bidirectional => MAX_STREAMS_BIDI_TAG,
            StreamType::Unidirectional => MAX_STREAMS_UNI_TAG,
        }
    }

    pub(crate) fn decode(tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let stream_type = if tag == MAX_STREAMS_BIDI_TAG {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        };
        let (maximum_streams, buffer) = buffer.decode()?;

        let frame = MaxStreams {
            stream_type,
            maximum_streams,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for MaxStreams {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.maximum_streams);
    }
}
