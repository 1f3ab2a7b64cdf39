// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{path_challenge::PATH_DATA_LEN, Tag};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.18
//# A PATH_RESPONSE frame (type=0x1b) is sent in response to a
//# PATH_CHALLENGE frame.

pub(crate) const PATH_RESPONSE_TAG: Tag = 0x1b;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathResponse {
    /// The data received in the corresponding PATH_CHALLENGE frame
    pub data: [u8; PATH_DATA_LEN],
}

impl PathResponse {
    #[inline]
    pub const fn tag(&self) -> Tag {
        PATH_RESPONSE_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (bytes, buffer) = buffer.decode_slice(PATH_DATA_LEN)?;
        let mut data = [0; PATH_DATA_LEN];
        data.copy_from_slice(bytes.into_less_safe_slice());

        Ok((PathResponse { data }, buffer))
    }
}

impl EncoderValue for PathResponse {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.write_slice(&self.data);
    }
}
