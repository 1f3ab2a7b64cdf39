// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    crypto::EncryptionLevel,
    frame::{AckElicitation, Frame},
    packer::{AckFrameSource, FrameSource},
};
use s2n_codec::EncoderValue;

/// An ordered sequence of frames and the serialized length they were
/// budgeted at.
///
/// `len` is composition-time accounting: stream frames are sized with
/// their Length field present, so after the final frame's Length is elided
/// the cached value may exceed the serialized size by that prefix. The
/// write path re-measures frames before serializing.
#[derive(Debug, Default)]
pub(crate) struct Payload {
    pub frames: Vec<Frame>,
    pub len: usize,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.len += frame.encoding_size();
        self.frames.push(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn ack_elicitation(&self) -> AckElicitation {
        self.frames
            .iter()
            .map(Frame::ack_elicitation)
            .fold(AckElicitation::default(), |acc, elicitation| {
                acc | elicitation
            })
    }
}

/// Gathers the frames of a 1-RTT packet under `max_frame_size` bytes
pub(crate) fn compose<A: AckFrameSource, F: FrameSource>(
    acks: &mut A,
    framer: &mut F,
    max_frame_size: usize,
) -> Payload {
    let mut payload = Payload::new();

    // ACKs go first, so the loss-recovery state the peer learns is never
    // staler than the data that follows it
    if let Some(ack) = acks.ack_frame(EncryptionLevel::OneRtt) {
        payload.push(Frame::Ack(ack));
    }

    let budget = max_frame_size.saturating_sub(payload.len);
    payload.len += framer.append_control_frames(&mut payload.frames, budget);

    // Stream frames are sized with their Length field present, but the last
    // frame of a packet elides it and runs to the packet boundary. One extra
    // byte of budget compensates for the minimum Length encoding; the
    // elision below returns at least that byte.
    let budget = (max_frame_size + 1).saturating_sub(payload.len);
    payload.len += framer.append_stream_frames(&mut payload.frames, budget);

    if let Some(Frame::Stream(stream)) = payload.frames.last_mut() {
        stream.is_last_frame = true;
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        packer::testing::{AckSource, Framer},
        varint::VarInt,
    };
    use bytes::Bytes;

    fn stream_frame(offset: u32, len: usize) -> crate::frame::Stream {
        crate::frame::Stream {
            stream_id: VarInt::from_u8(4),
            offset: VarInt::from_u32(offset),
            is_last_frame: false,
            is_fin: false,
            data: Bytes::from(vec![0x5a; len]),
        }
    }

    #[test]
    fn ack_goes_first_test() {
        let mut acks = AckSource::default();
        acks.pend(EncryptionLevel::OneRtt, VarInt::from_u8(9));
        let mut framer = Framer::default();
        framer.queue_control(
            crate::frame::MaxData {
                maximum_data: VarInt::from_u32(1 << 20),
            }
            .into(),
        );
        framer.queue_stream(stream_frame(0, 50));

        let payload = compose(&mut acks, &mut framer, 1200);

        assert!(matches!(payload.frames[0], Frame::Ack(_)));
        assert!(matches!(payload.frames[1], Frame::MaxData(_)));
        assert!(matches!(payload.frames[2], Frame::Stream(_)));
    }

    #[test]
    fn empty_sources_test() {
        let payload = compose(&mut AckSource::default(), &mut Framer::default(), 1200);
        assert!(payload.is_empty());
        assert_eq!(payload.ack_elicitation(), AckElicitation::NonEliciting);
    }

    #[test]
    fn last_stream_frame_elides_length_test() {
        let mut framer = Framer::default();
        framer.queue_stream(stream_frame(0, 20));
        framer.queue_stream(stream_frame(20, 30));

        let payload = compose(&mut AckSource::default(), &mut framer, 1200);

        let streams: Vec<_> = payload
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Stream(stream) => Some(stream),
                _ => None,
            })
            .collect();
        assert_eq!(streams.len(), 2);
        assert!(!streams[0].is_last_frame);
        assert!(streams[1].is_last_frame);
    }

    #[test]
    fn one_byte_budget_adjustment_test() {
        // a frame that overflows the raw budget by exactly the minimum
        // Length encoding still fits once its Length is elided
        let max_frame_size = 40;
        let frame = stream_frame(0, 37); // tag + id + len(1) + 37 = 40... sized at 40
        assert_eq!(frame.encoding_size(), max_frame_size);

        let mut framer = Framer::default();
        framer.queue_stream(stream_frame(0, 38)); // sized at 41 with Length present

        let payload = compose(&mut AckSource::default(), &mut framer, max_frame_size);

        assert_eq!(payload.frames.len(), 1);
        let serialized: usize = payload
            .frames
            .iter()
            .map(|frame| frame.encoding_size())
            .sum();
        assert!(serialized <= max_frame_size);
        match &payload.frames[0] {
            Frame::Stream(stream) => {
                assert!(stream.is_last_frame);
                assert_eq!(stream.data.len(), 38);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
