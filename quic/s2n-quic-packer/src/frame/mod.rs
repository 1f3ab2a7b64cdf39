// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The QUIC frames the send path produces

use core::{fmt, mem::size_of};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, DecoderError, Encoder, EncoderValue};

pub mod ack_elicitation;

pub use ack_elicitation::{AckElicitable, AckElicitation};
pub use max_streams::StreamType;

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.4
//# As described in Section 12.4, packets contain one or more frames.
//# This section describes the format and semantics of the core QUIC
//# frame types.

pub(crate) type Tag = u8;

/// Returned when a frame cannot fit into a given capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitError;

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "frame does not fit")
    }
}

macro_rules! frames {
    ($($tag_pat:pat => $module:ident, $ty:ident;)*) => {
        $(
            pub mod $module;
        )*
        $(
            pub use $module::$ty;
        )*

        /// A tagged variant over the frame types the packer can emit.
        ///
        /// Frames own their data: a packed packet retains its frame list for
        /// the loss-recovery module, and retransmission re-serializes the
        /// same values into fresh packets.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub enum Frame {
            $(
                $ty($ty),
            )*
        }

        impl Frame {
            pub fn tag(&self) -> Tag {
                match self {
                    $(
                        Frame::$ty(frame) => frame.tag(),
                    )*
                }
            }

            pub fn ack_elicitation(&self) -> AckElicitation {
                match self {
                    $(
                        Frame::$ty(frame) => frame.ack_elicitation(),
                    )*
                }
            }

            /// Decodes a single frame, returning the remaining buffer
            pub fn decode(buffer: DecoderBuffer<'_>) -> DecoderBufferResult<'_, Frame> {
                let tag = buffer.peek_byte(0)?;
                let buffer = buffer.skip(size_of::<Tag>())?;
                match tag {
                    $(
                        $tag_pat => {
                            let (frame, buffer) = $module::$ty::decode(tag, buffer)?;
                            Ok((Frame::$ty(frame), buffer))
                        }
                    )*
                    _ => Err(DecoderError::InvariantViolation("invalid frame")),
                }
            }
        }

        $(
            impl From<$ty> for Frame {
                #[inline]
                fn from(frame: $ty) -> Self {
                    Frame::$ty(frame)
                }
            }
        )*

        impl EncoderValue for Frame {
            #[inline]
            fn encode<E: Encoder>(&self, encoder: &mut E) {
                match self {
                    $(
                        Frame::$ty(frame) => encoder.encode(frame),
                    )*
                }
            }

            #[inline]
            fn encoding_size_for_encoder<E: Encoder>(&self, encoder: &E) -> usize {
                match self {
                    $(
                        Frame::$ty(frame) => frame.encoding_size_for_encoder(encoder),
                    )*
                }
            }
        }
    };
}

frames! {
    0x00 => padding, Padding;
    0x01 => ping, Ping;
    0x02 => ack, Ack;
    0x04 => reset_stream, ResetStream;
    0x05 => stop_sending, StopSending;
    0x06 => crypto, Crypto;
    0x07 => new_token, NewToken;
    0x08..=0x0f => stream, Stream;
    0x10 => max_data, MaxData;
    0x12 | 0x13 => max_streams, MaxStreams;
    0x11 => max_stream_data, MaxStreamData;
    0x14 => data_blocked, DataBlocked;
    0x15 => stream_data_blocked, StreamDataBlocked;
    0x16 | 0x17 => streams_blocked, StreamsBlocked;
    0x18 => new_connection_id, NewConnectionId;
    0x19 => retire_connection_id, RetireConnectionId;
    0x1a => path_challenge, PathChallenge;
    0x1b => path_response, PathResponse;
    0x1c | 0x1d => connection_close, ConnectionClose;
    0x1e => handshake_done, HandshakeDone;
}
