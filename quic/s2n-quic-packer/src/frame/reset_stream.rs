// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.4
//# An endpoint uses a RESET_STREAM frame (type=0x04) to abruptly
//# terminate the sending part of a stream.

pub(crate) const RESET_STREAM_TAG: Tag = 0x04;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetStream {
    /// A variable-length integer encoding of the stream ID of the stream
    /// being terminated
    pub stream_id: VarInt,

    /// The application protocol error code that indicates why the stream
    /// is being closed
    pub application_error_code: VarInt,

    /// The final size of the stream by the RESET_STREAM sender, in unit
    /// of bytes
    pub final_size: VarInt,
}

impl ResetStream {
    #[inline]
    pub const fn tag(&self) -> Tag {
        RESET_STREAM_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (stream_id, buffer) = buffer.decode()?;
        let (application_error_code, buffer) = buffer.decode()?;
        let (final_size, buffer) = buffer.decode()?;

        let frame = ResetStream {
            stream_id,
            application_error_code,
            final_size,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for ResetStream {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_id);
        encoder.encode(&self.application_error_code);
        encoder.encode(&self.final_size);
    }
}
