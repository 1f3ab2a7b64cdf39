// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use bytes::Bytes;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.19
//# An endpoint sends a CONNECTION_CLOSE frame (type=0x1c or 0x1d) to
//# notify its peer that the connection is being closed.  The
//# CONNECTION_CLOSE frame with a type of 0x1c is used to signal errors
//# at only the QUIC layer, or the absence of errors (with the NO_ERROR
//# code).  The CONNECTION_CLOSE frame with a type of 0x1d is used to
//# signal an error with the application that uses QUIC.

pub(crate) const QUIC_ERROR_TAG: Tag = 0x1c;
pub(crate) const APPLICATION_ERROR_TAG: Tag = 0x1d;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionClose {
    /// A variable length integer error code which indicates the reason
    /// for closing this connection.
    pub error_code: VarInt,

    /// A variable-length integer encoding the type of frame that
    /// triggered the error. Absent for application-level closes.
    pub frame_type: Option<VarInt>,

    /// A human-readable explanation for why the connection was closed.
    /// This SHOULD be a UTF-8 encoded string.
    pub reason: Bytes,
}

impl ConnectionClose {
    #[inline]
    pub fn tag(&self) -> Tag {
        if self.frame_type.is_some() {
            QUIC_ERROR_TAG
        } else {
            APPLICATION_ERROR_TAG
        }
    }

    pub(crate) fn decode(tag: Tag, buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Self> {
        let (error_code, buffer) = buffer.decode()?;

        let (frame_type, buffer) = if tag == QUIC_ERROR_TAG {
            let (frame_type, buffer) = buffer.decode()?;
            (Some(frame_type), buffer)
        } else {
            (None, buffer)
        };

        let (len, buffer) = buffer.decode::<VarInt>()?;
        let (reason, buffer) = buffer.decode_slice(len.as_u64() as usize)?;
        let reason = Bytes::copy_from_slice(reason.into_less_safe_slice());

        let frame = ConnectionClose {
            error_code,
            frame_type,
            reason,
        };

        Ok((frame, buffer))
    }
}

impl EncoderValue for ConnectionClose {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.error_code);

        if let Some(frame_type) = &self.frame_type {
            encoder.encode(frame_type);
        }

        encoder.encode_with_len_prefix::<VarInt, _>(&self.reason);
    }
}
