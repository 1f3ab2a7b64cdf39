// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.12
//# A sender SHOULD send a DATA_BLOCKED frame (type=0x14) when it wishes
//# to send data, but is unable to do so due to connection-level flow
//# control.

pub(crate) const DATA_BLOCKED_TAG: Tag = 0x14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataBlocked {
    /// The connection-level limit at which blocking occurred
    pub data_limit: VarInt,
}

impl DataBlocked {
    #[inline]
    pub const fn tag(&self) -> Tag {
        DATA_BLOCKED_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (data_limit, buffer) = buffer.decode()?;

        Ok((DataBlocked { data_limit }, buffer))
    }
}

impl EncoderValue for DataBlocked {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.data_limit);
    }
}
