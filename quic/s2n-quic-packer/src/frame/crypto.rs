// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{FitError, Tag},
    varint::VarInt,
};
use bytes::Bytes;
use core::{convert::TryFrom, mem::size_of};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.6
//# A CRYPTO frame (type=0x06) is used to transmit cryptographic
//# handshake messages.

pub(crate) const CRYPTO_TAG: Tag = 0x06;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.6
//# CRYPTO Frame {
//#   Type (i) = 0x06,
//#   Offset (i),
//#   Length (i),
//#   Crypto Data (..),
//# }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crypto {
    /// A variable-length integer specifying the byte offset in the stream
    /// for the data in this CRYPTO frame.
    pub offset: VarInt,

    /// The cryptographic message data.
    pub data: Bytes,
}

impl Crypto {
    #[inline]
    pub const fn tag(&self) -> Tag {
        CRYPTO_TAG
    }

    /// Tries to fit the frame into the provided capacity
    ///
    /// If ok, the new payload length is returned, otherwise the frame cannot
    /// fit.
    #[inline]
    pub fn try_fit(&self, capacity: usize) -> Result<usize, FitError> {
        let mut fixed_len = 0;
        fixed_len += size_of::<Tag>();
        fixed_len += self.offset.encoding_size();

        let remaining_capacity = capacity.checked_sub(fixed_len).ok_or(FitError)?;

        let data_len = self.data.len();
        let max_data_len = remaining_capacity.min(data_len);

        let len_prefix_size = VarInt::try_from(max_data_len)
            .map_err(|_| FitError)?
            .encoding_size();

        let prefixed_data_len = remaining_capacity
            .checked_sub(len_prefix_size)
            .ok_or(FitError)?;
        let data_len = prefixed_data_len.min(data_len);

        Ok(data_len)
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (offset, buffer) = buffer.decode()?;
        let (len, buffer) = buffer.decode::<VarInt>()?;
        let (data, buffer) = buffer.decode_slice(len.as_u64() as usize)?;
        let data = Bytes::copy_from_slice(data.into_less_safe_slice());

        Ok((Crypto { offset, data }, buffer))
    }
}

impl EncoderValue for Crypto {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.offset);
        encoder.encode_with_len_prefix::<VarInt, _>(&self.data);
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        let mut len = 0;
        len += size_of::<Tag>();
        len += self.offset.encoding_size();

        let data_len = self.data.len();
        len += VarInt::try_from(data_len).unwrap_or(VarInt::MAX).encoding_size();
        len += data_len;

        len
    }
}
