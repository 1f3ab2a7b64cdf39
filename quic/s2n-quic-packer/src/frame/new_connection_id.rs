// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{connection::ConnectionId, frame::Tag, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, DecoderError, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.15
//# An endpoint sends a NEW_CONNECTION_ID frame (type=0x18) to provide
//# its peer with alternative connection IDs that can be used to break
//# linkability when migrating connections.

pub(crate) const NEW_CONNECTION_ID_TAG: Tag = 0x18;

//= https://www.rfc-editor.org/rfc/rfc9000#section-10.3
//# A stateless reset token is specific to a connection ID.
pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewConnectionId {
    /// The sequence number assigned to the connection ID by the sender
    pub sequence_number: VarInt,

    /// The sequence number below which connection IDs are retired
    pub retire_prior_to: VarInt,

    /// The new connection ID
    pub connection_id: ConnectionId,

    /// A 128-bit value that will be used for a stateless reset when the
    /// associated connection ID is used
    pub stateless_reset_token: [u8; STATELESS_RESET_TOKEN_LEN],
}

impl NewConnectionId {
    #[inline]
    pub const fn tag(&self) -> Tag {
        NEW_CONNECTION_ID_TAG
    }

    pub(crate) fn decode(_tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (sequence_number, buffer) = buffer.decode()?;
        let (retire_prior_to, buffer) = buffer.decode()?;
        let (len, buffer) = buffer.decode::<u8>()?;
        let (id_bytes, buffer) = buffer.decode_slice(len as usize)?;
        let connection_id = ConnectionId::try_from_bytes(id_bytes.into_less_safe_slice())
            .ok_or(DecoderError::InvariantViolation("invalid connection id"))?;
        let (token_bytes, buffer) = buffer.decode_slice(STATELESS_RESET_TOKEN_LEN)?;
        let mut stateless_reset_token = [0; STATELESS_RESET_TOKEN_LEN];
        stateless_reset_token.copy_from_slice(token_bytes.into_less_safe_slice());

        let frame = NewConnectionId {
            sequence_number,
            retire_prior_to,
            connection_id,
            stateless_reset_token,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for NewConnectionId {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.sequence_number);
        encoder.encode(&self.retire_prior_to);
        encoder.encode(&(self.connection_id.len() as u8));
        encoder.encode(&self.connection_id);
        encoder.write_slice(&self.stateless_reset_token);
    }
}
