// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use bytes::Bytes;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.7
//# A server sends a NEW_TOKEN frame (type=0x07) to provide the client
//# with a token to send in the header of an Initial packet for a future
//# connection.

pub(crate) const NEW_TOKEN_TAG: Tag = 0x07;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewToken {
    /// An opaque blob that the client can use with a future Initial packet
    pub token: Bytes,
}

impl NewToken {
    #[inline]
    pub const fn tag(&self) -> Tag {
        NEW_TOKEN_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (len, buffer) = buffer.decode::<VarInt>()?;
        let (token, buffer) = buffer.decode_slice(len.as_u64() as usize)?;
        let token = Bytes::copy_from_slice(token.into_less_safe_slice());

        Ok((NewToken { token }, buffer))
    }
}

impl EncoderValue for NewToken {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode_with_len_prefix::<VarInt, _>(&self.token);
    }
}
