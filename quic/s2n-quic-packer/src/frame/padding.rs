// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::Tag;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.1
//# A PADDING frame (type=0x00) has no semantic value.  PADDING frames
//# can be used to increase the size of a packet.  Padding can be used to
//# increase an Initial packet to the minimum required size or to provide
//# protection against traffic analysis for protected packets.

pub(crate) const PADDING_TAG: Tag = 0x00;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Padding {
    pub length: usize,
}

impl Padding {
    pub const fn tag(self) -> Tag {
        PADDING_TAG
    }

    /// Consecutive zero bytes decode as a single frame
    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let mut length = 0;
        while buffer
            .peek_byte(length)
            .map(|value| value == PADDING_TAG)
            .unwrap_or(false)
        {
            length += 1;
        }

        let buffer = buffer.skip(length)?;

        // add one for the tag itself, which the dispatcher already consumed
        length += 1;

        Ok((Padding { length }, buffer))
    }
}

impl EncoderValue for Padding {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_repeated(self.length, 0)
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.length
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        self.length
    }
}
