// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.5
//# An endpoint uses a STOP_SENDING frame (type=0x05) to communicate that
//# incoming data is being discarded on receipt per application request.

pub(crate) const STOP_SENDING_TAG: Tag = 0x05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSending {
    /// A variable-length integer carrying the stream ID of the stream
    /// being ignored
    pub stream_id: VarInt,

    /// The application-specified reason the sender is ignoring the
    /// stream
    pub application_error_code: VarInt,
}

impl StopSending {
    #[inline]
    pub const fn tag(&self) -> Tag {
        STOP_SENDING_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (stream_id, buffer) = buffer.decode()?;
        let (application_error_code, buffer) = buffer.decode()?;

        let frame = StopSending {
            stream_id,
            application_error_code,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for StopSending {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.stream_id);
        encoder.encode(&self.application_error_code);
    }
}
