// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.16
//# An endpoint sends a RETIRE_CONNECTION_ID frame (type=0x19) to
//# indicate that it will no longer use a connection ID that was issued
//# by its peer.

pub(crate) const RETIRE_CONNECTION_ID_TAG: Tag = 0x19;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetireConnectionId {
    /// The sequence number of the connection ID being retired
    pub sequence_number: VarInt,
}

impl RetireConnectionId {
    #[inline]
    pub const fn tag(&self) -> Tag {
        RETIRE_CONNECTION_ID_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (sequence_number, buffer) = buffer.decode()?;

        Ok((RetireConnectionId { sequence_number }, buffer))
    }
}

impl EncoderValue for RetireConnectionId {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.sequence_number);
    }
}
