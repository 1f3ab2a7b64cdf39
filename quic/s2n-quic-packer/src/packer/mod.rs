// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Assembles outgoing packets from queued frames
//!
//! The [`Packer`] is the single stateful component of the send path: it
//! picks the encryption level, gathers frames under the packet budget,
//! serializes the header and payload into a pooled buffer, seals the
//! payload and applies header protection. It is driven sequentially by the
//! connection's send loop and holds no locks.

use crate::{
    buffer,
    connection::ConnectionId,
    crypto::{self, EncryptionLevel, Sealer, SealerManager},
    endpoint,
    frame::{self, AckElicitation, Frame},
    packet::{
        header::Header,
        number::{PacketNumberLen, PacketNumberSpace, TruncatedPacketNumber},
        Version,
    },
    transport::TransportParameters,
    varint::VarInt,
};
use bytes::Bytes;
use s2n_codec::{Encoder, EncoderBuffer, EncoderValue};
use std::collections::VecDeque;
use tracing::trace;

pub(crate) mod payload;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

//= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
//# A client MUST expand the payload of all UDP datagrams carrying
//# Initial packets to at least the smallest allowed maximum datagram
//# size of 1200 bytes

/// The size a client pads its Initial packets to
pub const MIN_INITIAL_PACKET_LEN: usize = 1200;

/// The packet budget assumed before the peer advertises a
/// max_udp_payload_size: the IPv4 minimum-MTU allowance
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1252;

/// The number of consecutive non-ack-eliciting packets after which a PING
/// frame is inserted, so the peer acknowledges the ACKs we keep sending
pub const MAX_NON_ACK_ELICITING_ACKS: usize = 19;

/// Stream draining during retransmission stops once less than this much
/// budget remains; the tail moves to the next packet instead
pub(crate) const MIN_STREAM_FRAME_SIZE: usize = 128;

/// Supplies send-side packet numbers, one counter per packet number space
pub trait PacketNumberManager {
    /// Returns the next packet number and its minimum wire encoding,
    /// without advancing.
    ///
    /// Repeated peeks return the same value until the number is popped.
    fn peek(&self, space: PacketNumberSpace) -> (VarInt, PacketNumberLen);

    /// Advances the space and returns the number that was committed to
    /// the wire
    fn pop(&mut self, space: PacketNumberSpace) -> VarInt;
}

/// One crypto stream, holding the handshake messages queued at a single
/// encryption level
pub trait CryptoStream {
    fn has_data(&self) -> bool;

    /// Pops a CRYPTO frame no larger than `max_len` bytes on the wire,
    /// frame header included
    fn pop_crypto_frame(&mut self, max_len: usize) -> Option<frame::Crypto>;
}

/// Queues control and stream frames for 1-RTT packets
pub trait FrameSource {
    /// Appends as many queued control frames as fit within `budget` and
    /// returns the serialized bytes consumed
    fn append_control_frames(&mut self, frames: &mut Vec<Frame>, budget: usize) -> usize;

    /// Appends queued STREAM frames within `budget` and returns the
    /// serialized bytes consumed.
    ///
    /// Frames are appended and sized with their Length field present; the
    /// packer elides the field on the final frame of the packet.
    fn append_stream_frames(&mut self, frames: &mut Vec<Frame>, budget: usize) -> usize;
}

/// Produces ACK frames per encryption level.
///
/// Returning a frame marks it as in flight, so callers only ask when they
/// intend to pack it.
pub trait AckFrameSource {
    fn ack_frame(&mut self, level: EncryptionLevel) -> Option<frame::Ack>;
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The handshake has not yet installed, or has already discarded, the
    /// keys for the requested level. The send loop drops this packet and
    /// retries later.
    #[error("no sealer available at the {0} encryption level")]
    KeysUnavailable(EncryptionLevel),

    /// The sizing model and the serialized packet diverged; the connection
    /// must be torn down.
    #[error("BUG: assembled packet of {len} bytes exceeds the maximum packet size of {max}")]
    OversizedPacket { len: usize, max: usize },

    /// The packet-number manager advanced out from under the packer; the
    /// connection must be torn down.
    #[error("BUG: peeked packet number {peeked} does not match popped packet number {popped}")]
    PacketNumberDesync { peeked: VarInt, popped: VarInt },

    /// A non-splittable retransmitted frame exceeds even an empty packet's
    /// budget; with stable header sizes this indicates the frames were not
    /// produced by this packer.
    #[error("a retransmitted frame no longer fits into an empty packet")]
    RetransmissionTooLarge,
}

/// A wire-ready packet: the sealed bytes plus the metadata the
/// loss-recovery module inspects.
///
/// The frame list is immutable once the packet is sealed; hand loss
/// recovery a [`SentPacket`] copy instead of mutating it. Dropping the
/// packet releases its buffer back to the pool.
#[derive(Debug)]
pub struct PackedPacket {
    pub header: Header,
    /// The full packet number the header's truncated encoding was derived
    /// from
    pub packet_number: VarInt,
    pub frames: Vec<Frame>,
    buffer: buffer::Entry,
    len: usize,
}

impl PackedPacket {
    /// The sealed packet bytes, ready for the UDP socket
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The total wire size of the packet
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn encryption_level(&self) -> EncryptionLevel {
        self.header.encryption_level()
    }

    #[inline]
    pub fn ack_elicitation(&self) -> AckElicitation {
        self.frames
            .iter()
            .map(Frame::ack_elicitation)
            .fold(AckElicitation::default(), |acc, elicitation| {
                acc | elicitation
            })
    }

    /// Copies out the record the loss-recovery module tracks and later
    /// hands back to [`Packer::pack_retransmission`]
    pub fn sent_packet(&self) -> SentPacket {
        SentPacket {
            packet_number: self.packet_number,
            encryption_level: self.encryption_level(),
            frames: self.frames.clone(),
            len: self.len,
        }
    }
}

/// The parts of a previously sent packet that outlive its buffer
#[derive(Clone, Debug)]
pub struct SentPacket {
    pub packet_number: VarInt,
    pub encryption_level: EncryptionLevel,
    pub frames: Vec<Frame>,
    pub len: usize,
}

/// Connection-scoped parameters the packer is constructed with
#[derive(Clone, Debug)]
pub struct Config {
    pub version: Version,
    pub destination_connection_id: ConnectionId,
    pub source_connection_id: ConnectionId,
    pub perspective: endpoint::Type,
    /// The retry token attached to client Initial packets; may be empty
    pub token: Bytes,
    pub max_packet_size: usize,
}

impl Config {
    pub fn new(
        version: Version,
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
        perspective: endpoint::Type,
    ) -> Self {
        Self {
            version,
            destination_connection_id,
            source_connection_id,
            perspective,
            token: Bytes::new(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// Mutable borrows of a packer's collaborators, for tests and simulations
#[cfg(any(test, feature = "testing"))]
pub struct Collaborators<'a, PN, S, C, A, F> {
    pub packet_numbers: &'a mut PN,
    pub sealers: &'a mut S,
    pub initial_stream: &'a mut C,
    pub handshake_stream: &'a mut C,
    pub acks: &'a mut A,
    pub framer: &'a mut F,
}

/// Assembles outgoing packets; one per connection
pub struct Packer<PN, S, C, A, F> {
    destination_connection_id: ConnectionId,
    source_connection_id: ConnectionId,
    version: Version,
    perspective: endpoint::Type,
    token: Bytes,
    max_packet_size: usize,
    /// Consecutive packets sent without an ack-eliciting frame
    non_ack_eliciting_acks: usize,
    buffers: buffer::Pool,
    packet_numbers: PN,
    sealers: S,
    initial_stream: C,
    handshake_stream: C,
    acks: A,
    framer: F,
}

impl<PN, S, C, A, F> Packer<PN, S, C, A, F>
where
    PN: PacketNumberManager,
    S: SealerManager,
    C: CryptoStream,
    A: AckFrameSource,
    F: FrameSource,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        buffers: buffer::Pool,
        packet_numbers: PN,
        sealers: S,
        initial_stream: C,
        handshake_stream: C,
        acks: A,
        framer: F,
    ) -> Self {
        Self {
            destination_connection_id: config.destination_connection_id,
            source_connection_id: config.source_connection_id,
            version: config.version,
            perspective: config.perspective,
            token: config.token,
            max_packet_size: config.max_packet_size.min(buffer::MAX_PACKET_BUFFER_LEN),
            non_ack_eliciting_acks: 0,
            buffers,
            packet_numbers,
            sealers,
            initial_stream,
            handshake_stream,
            acks,
            framer,
        }
    }

    /// Produces the next ordinary packet.
    ///
    /// Pending crypto data or crypto-level ACKs take precedence; otherwise
    /// a 1-RTT packet is composed from the ACK, control and stream frame
    /// sources. Returns `Ok(None)` when no frames are available to send.
    pub fn pack_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        if let Some(packet) = self.maybe_pack_crypto_packet()? {
            return Ok(Some(packet));
        }

        let (level, overhead) = {
            let (level, sealer) = self.sealers.sealer();
            (level, sealer.overhead())
        };
        let header = self.header(level);
        let header_len = header.encoding_size();
        let max_frame_size = self
            .max_packet_size
            .saturating_sub(overhead + header_len);

        let mut payload = payload::compose(&mut self.acks, &mut self.framer, max_frame_size);
        if payload.is_empty() {
            return Ok(None);
        }

        let is_ack_eliciting = payload.ack_elicitation().is_ack_eliciting();
        let mut inserted_ping = false;
        if !is_ack_eliciting && self.non_ack_eliciting_acks >= MAX_NON_ACK_ELICITING_ACKS {
            payload.push(Frame::Ping(frame::Ping));
            inserted_ping = true;
        }

        let packet = self.write_and_seal(header, payload.frames)?;

        if is_ack_eliciting || inserted_ping {
            self.non_ack_eliciting_acks = 0;
        } else {
            self.non_ack_eliciting_acks += 1;
        }

        Ok(Some(packet))
    }

    /// Packs a packet containing only a pending 1-RTT ACK frame.
    ///
    /// Returns `Ok(None)` when no ACK is pending. The ACK is fetched and
    /// sealed at the same (1-RTT) level.
    pub fn maybe_pack_ack_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        let ack = match self.acks.ack_frame(EncryptionLevel::OneRtt) {
            Some(ack) => ack,
            None => return Ok(None),
        };

        let header = self.header(EncryptionLevel::OneRtt);
        let packet = self.write_and_seal(header, vec![Frame::Ack(ack)])?;
        self.non_ack_eliciting_acks += 1;

        Ok(Some(packet))
    }

    /// Reassembles the frames of a previously sent packet into one or more
    /// new packets at the packet's original encryption level, with fresh
    /// packet numbers.
    ///
    /// STREAM frames split across packets when the budget shrank since the
    /// original transmission; CRYPTO and control frames never split. Long
    /// headers always carry maximum-length packet numbers, so a
    /// retransmission's header is never larger than the original's and its
    /// crypto frames are guaranteed to still fit.
    pub fn pack_retransmission(
        &mut self,
        packet: SentPacket,
    ) -> Result<Vec<PackedPacket>, Error> {
        let level = packet.encryption_level;

        let mut control = VecDeque::new();
        let mut streams = VecDeque::new();
        for frame in packet.frames {
            match frame {
                Frame::Stream(mut stream) => {
                    // drained with the Length field present; the final frame
                    // of each output packet elides it again
                    stream.is_last_frame = false;
                    streams.push_back(stream);
                }
                frame => control.push_back(frame),
            }
        }

        let overhead = self
            .sealers
            .sealer_at(level)
            .ok_or(Error::KeysUnavailable(level))?
            .overhead();

        let mut packets = Vec::new();
        while !control.is_empty() || !streams.is_empty() {
            let header = self.header(level);
            let header_len = header.encoding_size();
            let max_size = self.max_packet_size.saturating_sub(overhead + header_len);

            let mut frames = Vec::new();
            let mut len = 0;

            while let Some(frame) = control.pop_front() {
                let size = frame.encoding_size();
                if len + size > max_size {
                    control.push_front(frame);
                    break;
                }
                len += size;
                frames.push(frame);
            }

            // the Length elision on the last STREAM frame buys one byte
            let max_size = max_size + 1;
            while let Some(mut stream) = streams.pop_front() {
                if len + MIN_STREAM_FRAME_SIZE >= max_size {
                    streams.push_front(stream);
                    break;
                }
                match stream.split_off(max_size - len) {
                    Some(first) => {
                        len += first.encoding_size();
                        frames.push(Frame::Stream(first));
                        streams.push_front(stream);
                    }
                    None => {
                        len += stream.encoding_size();
                        frames.push(Frame::Stream(stream));
                    }
                }
            }

            if let Some(Frame::Stream(stream)) = frames.last_mut() {
                stream.is_last_frame = true;
            }

            if frames.is_empty() {
                return Err(Error::RetransmissionTooLarge);
            }

            packets.push(self.write_and_seal(header, frames)?);
        }

        Ok(packets)
    }

    /// Packs a packet whose entire payload is the given CONNECTION_CLOSE
    /// frame, at the current default sealer's level
    pub fn pack_connection_close(
        &mut self,
        frame: frame::ConnectionClose,
    ) -> Result<PackedPacket, Error> {
        let level = self.sealers.sealer().0;
        let header = self.header(level);
        self.write_and_seal(header, vec![Frame::ConnectionClose(frame)])
    }

    /// Clamps the packet budget to the peer's advertised limit
    pub fn handle_transport_parameters(&mut self, params: &TransportParameters) {
        if let Some(max_udp_payload_size) = params.max_udp_payload_size {
            let advertised = max_udp_payload_size.as_u64().min(usize::MAX as u64) as usize;
            self.max_packet_size = self.max_packet_size.min(advertised);
        }
    }

    /// Replaces the retry token attached to subsequent client Initial
    /// packets
    pub fn set_token(&mut self, token: Bytes) {
        self.token = token;
    }

    /// Updates the destination connection ID used by all subsequent headers
    pub fn change_dest_connection_id(&mut self, connection_id: ConnectionId) {
        self.destination_connection_id = connection_id;
    }

    /// Packs a crypto packet when handshake data or a crypto-level ACK is
    /// pending.
    ///
    /// Initial takes precedence over Handshake; the payload is at most the
    /// pending ACK followed by a single CRYPTO frame filling the budget.
    fn maybe_pack_crypto_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        let mut level = EncryptionLevel::Initial;
        let mut has_data = self.initial_stream.has_data();
        let mut ack = self.acks.ack_frame(level);

        if !has_data && ack.is_none() {
            level = EncryptionLevel::Handshake;
            has_data = self.handshake_stream.has_data();
            ack = self.acks.ack_frame(level);

            if !has_data && ack.is_none() {
                return Ok(None);
            }
        }

        let overhead = self
            .sealers
            .sealer_at(level)
            .ok_or(Error::KeysUnavailable(level))?
            .overhead();
        let header = self.header(level);
        let header_len = header.encoding_size();

        let mut frames = Vec::with_capacity(2);
        let mut len = 0;
        if let Some(ack) = ack {
            let ack = Frame::Ack(ack);
            len += ack.encoding_size();
            frames.push(ack);
        }

        if has_data {
            let max_len = self
                .max_packet_size
                .saturating_sub(header_len + overhead + len);
            let stream = match level {
                EncryptionLevel::Initial => &mut self.initial_stream,
                _ => &mut self.handshake_stream,
            };
            if let Some(crypto) = stream.pop_crypto_frame(max_len) {
                frames.push(Frame::Crypto(crypto));
            }
        }

        if frames.is_empty() {
            return Ok(None);
        }

        self.write_and_seal(header, frames).map(Some)
    }

    /// Builds the header for the given encryption level.
    ///
    /// The packet number is peeked, not popped; long headers force the
    /// maximum packet-number length and pre-fill the Length field with the
    /// packet budget so the serialized header never changes size.
    fn header(&self, level: EncryptionLevel) -> Header {
        let space = level.packet_number_space();
        let (packet_number, packet_number_len) = self.packet_numbers.peek(space);

        match level {
            EncryptionLevel::OneRtt => Header::Short {
                destination_connection_id: self.destination_connection_id,
                packet_number: TruncatedPacketNumber::new(packet_number, packet_number_len),
            },
            EncryptionLevel::Initial => Header::Initial {
                version: self.version,
                destination_connection_id: self.destination_connection_id,
                source_connection_id: self.source_connection_id,
                token: if self.perspective.is_client() {
                    self.token.clone()
                } else {
                    Bytes::new()
                },
                payload_len: VarInt::from_u16(self.max_packet_size as u16),
                packet_number: TruncatedPacketNumber::new(packet_number, PacketNumberLen::MAX),
            },
            EncryptionLevel::Handshake => Header::Handshake {
                version: self.version,
                destination_connection_id: self.destination_connection_id,
                source_connection_id: self.source_connection_id,
                payload_len: VarInt::from_u16(self.max_packet_size as u16),
                packet_number: TruncatedPacketNumber::new(packet_number, PacketNumberLen::MAX),
            },
        }
    }

    /// Direct collaborator access for tests and simulations
    #[cfg(any(test, feature = "testing"))]
    pub fn collaborators_mut(&mut self) -> Collaborators<'_, PN, S, C, A, F> {
        Collaborators {
            packet_numbers: &mut self.packet_numbers,
            sealers: &mut self.sealers,
            initial_stream: &mut self.initial_stream,
            handshake_stream: &mut self.handshake_stream,
            acks: &mut self.acks,
            framer: &mut self.framer,
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn non_ack_eliciting_acks(&self) -> usize {
        self.non_ack_eliciting_acks
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Serializes, pads, seals and header-protects a packet.
    ///
    /// The packet number is popped only after every fallible step has
    /// succeeded, so a failed pack never leaves a gap in the sequence.
    fn write_and_seal(
        &mut self,
        mut header: Header,
        frames: Vec<Frame>,
    ) -> Result<PackedPacket, Error> {
        let level = header.encryption_level();
        let space = level.packet_number_space();
        let (packet_number, _) = self.packet_numbers.peek(space);
        let pn_len = header.packet_number_len().bytesize();

        let overhead = self
            .sealers
            .sealer_at(level)
            .ok_or(Error::KeysUnavailable(level))?
            .overhead();

        let payload_len: usize = frames
            .iter()
            .map(|frame| frame.encoding_size())
            .sum();

        // stable by construction: the Length field keeps its 2-byte
        // encoding through the fixup below
        let header_len = header.encoding_size();

        let mut padding_len = 0;
        if header.is_long() {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
            //# A client MUST expand the payload of all UDP datagrams carrying
            //# Initial packets to at least the smallest allowed maximum
            //# datagram size of 1200 bytes
            if matches!(header, Header::Initial { .. }) && self.perspective.is_client() {
                padding_len =
                    MIN_INITIAL_PACKET_LEN.saturating_sub(overhead + header_len + payload_len);
            }
            header.set_payload_len(pn_len + payload_len + padding_len + overhead);
        } else if pn_len + payload_len < 4 {
            // header protection samples as if the packet number were 4
            // bytes, so the packet number plus payload must cover at least
            // 4 bytes ahead of the authentication tag
            padding_len = 4 - pn_len - payload_len;
        }

        let len = header_len + padding_len + payload_len;
        if len + overhead > self.max_packet_size {
            return Err(Error::OversizedPacket {
                len: len + overhead,
                max: self.max_packet_size,
            });
        }

        let mut buffer = self.buffers.get();

        let payload_offset = {
            let mut encoder = EncoderBuffer::new(&mut buffer);
            encoder.encode(&header);
            let payload_offset = encoder.len();
            debug_assert_eq!(payload_offset, header_len);

            // PADDING frames are runs of zero bytes
            encoder.write_repeated(padding_len, 0);
            for frame in &frames {
                encoder.encode(frame);
            }
            debug_assert_eq!(encoder.len(), len, "sizing diverged from serialization");

            payload_offset
        };

        let sealer = self
            .sealers
            .sealer_at(level)
            .ok_or(Error::KeysUnavailable(level))?;

        {
            let (header_bytes, payload_bytes) = buffer.split_at_mut(payload_offset);
            let sealed_len = len - payload_offset + overhead;
            sealer.seal(
                packet_number.as_u64(),
                header_bytes,
                &mut payload_bytes[..sealed_len],
            );
        }
        let len = len + overhead;

        //= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.2
        //# in sampling packet ciphertext for header protection,
        //# the Packet Number field is assumed to be 4 bytes long
        let pn_offset = payload_offset - pn_len;
        let sample = crypto::header_protection_sample(
            &buffer,
            pn_offset,
            sealer.header_protection_sample_len(),
        );
        let mask = sealer.header_protection_mask(sample);
        crypto::apply_header_protection(mask, &mut buffer[..len], pn_offset, pn_len);

        let popped = self.packet_numbers.pop(space);
        if popped != packet_number {
            return Err(Error::PacketNumberDesync {
                peeked: packet_number,
                popped,
            });
        }

        trace!(
            packet_number = packet_number.as_u64(),
            level = %level,
            len,
            "packed packet"
        );

        Ok(PackedPacket {
            header,
            packet_number,
            frames,
            buffer,
            len,
        })
    }
}
