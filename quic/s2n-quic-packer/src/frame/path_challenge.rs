// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::Tag;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.17
//# Endpoints can use PATH_CHALLENGE frames (type=0x1a) to check
//# reachability to the peer and for path validation during connection
//# migration.

pub(crate) const PATH_CHALLENGE_TAG: Tag = 0x1a;

pub const PATH_DATA_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathChallenge {
    /// An 8-byte field of arbitrary data, chosen so it can be recognized
    /// when echoed back
    pub data: [u8; PATH_DATA_LEN],
}

impl PathChallenge {
    #[inline]
    pub const fn tag(&self) -> Tag {
        PATH_CHALLENGE_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (bytes, buffer) = buffer.decode_slice(PATH_DATA_LEN)?;
        let mut data = [0; PATH_DATA_LEN];
        data.copy_from_slice(bytes.into_less_safe_slice());

        Ok((PathChallenge { data }, buffer))
    }
}

impl EncoderValue for PathChallenge {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.write_slice(&self.data);
    }
}
