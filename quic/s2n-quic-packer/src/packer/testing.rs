// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Deterministic collaborator implementations for exercising the packer

use crate::{
    crypto::EncryptionLevel,
    frame::{self, Frame},
    packet::number::{PacketNumberLen, PacketNumberSpace},
    varint::VarInt,
};
use bytes::Bytes;
use s2n_codec::EncoderValue;
use std::collections::VecDeque;

fn space_index(space: PacketNumberSpace) -> usize {
    match space {
        PacketNumberSpace::Initial => 0,
        PacketNumberSpace::Handshake => 1,
        PacketNumberSpace::ApplicationData => 2,
    }
}

fn level_index(level: EncryptionLevel) -> usize {
    space_index(level.packet_number_space())
}

/// Per-space counters handing out contiguous packet numbers
#[derive(Debug)]
pub struct PacketNumbers {
    spaces: [(u64, PacketNumberLen); 3],
}

impl Default for PacketNumbers {
    fn default() -> Self {
        Self {
            spaces: [(0, PacketNumberLen::Len2); 3],
        }
    }
}

impl PacketNumbers {
    /// Overrides the encoding length the manager reports for a space
    pub fn set_len(&mut self, space: PacketNumberSpace, len: PacketNumberLen) {
        self.spaces[space_index(space)].1 = len;
    }

    /// The next packet number the space will hand out
    pub fn next(&self, space: PacketNumberSpace) -> u64 {
        self.spaces[space_index(space)].0
    }
}

impl super::PacketNumberManager for PacketNumbers {
    fn peek(&self, space: PacketNumberSpace) -> (VarInt, PacketNumberLen) {
        let (next, len) = self.spaces[space_index(space)];
        (VarInt::new(next).unwrap(), len)
    }

    fn pop(&mut self, space: PacketNumberSpace) -> VarInt {
        let (next, _) = self.spaces[space_index(space)];
        self.spaces[space_index(space)].0 += 1;
        VarInt::new(next).unwrap()
    }
}

/// A crypto-stream mock backed by a queue of handshake bytes
#[derive(Debug, Default)]
pub struct CryptoBuffer {
    queue: VecDeque<u8>,
    offset: u64,
}

impl CryptoBuffer {
    pub fn queue(&mut self, data: &[u8]) {
        self.queue.extend(data);
    }
}

impl super::CryptoStream for CryptoBuffer {
    fn has_data(&self) -> bool {
        !self.queue.is_empty()
    }

    fn pop_crypto_frame(&mut self, max_len: usize) -> Option<frame::Crypto> {
        if self.queue.is_empty() {
            return None;
        }

        let offset = VarInt::new(self.offset).unwrap();
        let sizing = frame::Crypto {
            offset,
            data: Bytes::from(self.queue.iter().copied().collect::<Vec<_>>()),
        };
        let data_len = sizing.try_fit(max_len).ok()?;
        if data_len == 0 {
            return None;
        }

        let data: Bytes = self.queue.drain(..data_len).collect::<Vec<_>>().into();
        self.offset += data_len as u64;

        Some(frame::Crypto { offset, data })
    }
}

/// Hands out at most one pending ACK per encryption level
#[derive(Debug, Default)]
pub struct AckSource {
    pending: [Option<frame::Ack>; 3],
}

impl AckSource {
    /// Marks an ACK for `largest` as pending at `level`
    pub fn pend(&mut self, level: EncryptionLevel, largest: VarInt) {
        self.pending[level_index(level)] = Some(frame::Ack::for_largest(largest));
    }

    pub fn is_pending(&self, level: EncryptionLevel) -> bool {
        self.pending[level_index(level)].is_some()
    }
}

impl super::AckFrameSource for AckSource {
    fn ack_frame(&mut self, level: EncryptionLevel) -> Option<frame::Ack> {
        self.pending[level_index(level)].take()
    }
}

/// Queues of control and stream frames, drained to fit each budget
#[derive(Debug, Default)]
pub struct Framer {
    control: VecDeque<Frame>,
    streams: VecDeque<frame::Stream>,
}

impl Framer {
    pub fn queue_control(&mut self, frame: Frame) {
        self.control.push_back(frame);
    }

    pub fn queue_stream(&mut self, frame: frame::Stream) {
        debug_assert!(!frame.is_last_frame);
        self.streams.push_back(frame);
    }
}

impl super::FrameSource for Framer {
    fn append_control_frames(&mut self, frames: &mut Vec<Frame>, budget: usize) -> usize {
        let mut consumed = 0;
        while let Some(frame) = self.control.pop_front() {
            let size = frame.encoding_size();
            if consumed + size > budget {
                self.control.push_front(frame);
                break;
            }
            consumed += size;
            frames.push(frame);
        }
        consumed
    }

    fn append_stream_frames(&mut self, frames: &mut Vec<Frame>, budget: usize) -> usize {
        let mut consumed = 0;
        while let Some(mut stream) = self.streams.pop_front() {
            let remaining = budget - consumed;
            if stream.encoding_size() <= remaining {
                consumed += stream.encoding_size();
                frames.push(Frame::Stream(stream));
                continue;
            }

            if let Some(first) = stream.split_off(remaining) {
                consumed += first.encoding_size();
                frames.push(Frame::Stream(first));
            }
            self.streams.push_front(stream);
            break;
        }
        consumed
    }
}
