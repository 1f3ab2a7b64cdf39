// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::{testing::*, *};
use crate::{
    crypto::testing as crypto_testing,
    packet::number::TruncatedPacketNumber,
};
use s2n_codec::DecoderBuffer;

type TestPacker = Packer<PacketNumbers, crypto_testing::Sealers, CryptoBuffer, AckSource, Framer>;

fn dcid() -> ConnectionId {
    ConnectionId::try_from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap()
}

fn scid() -> ConnectionId {
    ConnectionId::try_from_bytes(&[9, 10, 11, 12]).unwrap()
}

fn packer(perspective: endpoint::Type) -> TestPacker {
    Packer::new(
        Config::new(crate::packet::VERSION, dcid(), scid(), perspective),
        buffer::Pool::default(),
        PacketNumbers::default(),
        crypto_testing::Sealers::default(),
        CryptoBuffer::default(),
        CryptoBuffer::default(),
        AckSource::default(),
        Framer::default(),
    )
}

fn stream_frame(offset: u32, len: usize) -> frame::Stream {
    frame::Stream {
        stream_id: VarInt::from_u8(4),
        offset: VarInt::from_u32(offset),
        is_last_frame: false,
        is_fin: false,
        data: Bytes::from((0..len).map(|byte| byte as u8).collect::<Vec<_>>()),
    }
}

/// Removes header protection, authenticates and decrypts the packet with
/// the given testing sealer, and reparses the payload's frame sequence
fn open(packet: &PackedPacket, sealer: &crypto_testing::Sealer) -> Vec<Frame> {
    let mut bytes = packet.as_slice().to_vec();
    let header_len = packet.header.encoding_size();
    let pn_len = packet.header.packet_number_len().bytesize();
    let pn_offset = header_len - pn_len;

    let sample = crypto::header_protection_sample(
        &bytes,
        pn_offset,
        crypto::HEADER_PROTECTION_SAMPLE_LEN,
    );
    let mask = sealer.header_protection_mask(sample);
    let unprotected_pn_len = crypto::remove_header_protection(mask, &mut bytes, pn_offset);
    assert_eq!(unprotected_pn_len, pn_len);

    let (truncated, _) = TruncatedPacketNumber::decode(
        DecoderBuffer::new(&bytes[pn_offset..header_len]),
        packet.header.packet_number_len(),
    )
    .unwrap();
    assert_eq!(truncated, packet.header.packet_number());

    let (header_bytes, payload) = bytes.split_at_mut(header_len);
    let plaintext_len = sealer
        .open(packet.packet_number.as_u64(), header_bytes, payload)
        .expect("packet should authenticate");

    let mut frames = Vec::new();
    let mut buffer = DecoderBuffer::new(&payload[..plaintext_len]);
    while !buffer.is_empty() {
        let (frame, remaining) = Frame::decode(buffer).unwrap();
        frames.push(frame);
        buffer = remaining;
    }
    frames
}

fn without_padding(frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .filter(|frame| !matches!(frame, Frame::Padding(_)))
        .collect()
}

#[test]
fn client_first_flight_test() {
    let mut packer = packer(endpoint::Type::Client);
    packer.collaborators_mut().initial_stream.queue(&[0x42; 512]);

    let packet = packer.pack_packet().unwrap().expect("a packet");

    assert_eq!(packet.encryption_level(), EncryptionLevel::Initial);
    assert_eq!(packet.packet_number, VarInt::ZERO);
    // long headers force the maximum packet number length
    assert_eq!(packet.header.packet_number_len(), PacketNumberLen::MAX);
    assert_eq!(packet.len(), MIN_INITIAL_PACKET_LEN);

    assert_eq!(packet.frames.len(), 1);
    match &packet.frames[0] {
        Frame::Crypto(cf) => {
            assert_eq!(cf.offset, VarInt::ZERO);
            assert_eq!(cf.data.len(), 512);
        }
        other => panic!("unexpected frame {other:?}"),
    }

    let sealer = packer.collaborators_mut().sealers.initial.unwrap();
    assert_eq!(without_padding(open(&packet, &sealer)), packet.frames);
}

#[test]
fn ack_only_packet_test() {
    let mut packer = packer(endpoint::Type::Server);
    packer
        .collaborators_mut()
        .acks
        .pend(EncryptionLevel::OneRtt, VarInt::from_u8(11));

    let packet = packer.maybe_pack_ack_packet().unwrap().expect("a packet");

    assert_eq!(packet.encryption_level(), EncryptionLevel::OneRtt);
    assert!(matches!(packet.header, Header::Short { .. }));
    assert_eq!(packet.frames.len(), 1);
    assert!(matches!(packet.frames[0], Frame::Ack(_)));
    assert!(!packet.ack_elicitation().is_ack_eliciting());
    assert_eq!(packer.non_ack_eliciting_acks(), 1);

    // nothing pending => no packet, no packet number consumed
    assert!(packer.maybe_pack_ack_packet().unwrap().is_none());
    assert_eq!(
        packer
            .collaborators_mut()
            .packet_numbers
            .next(PacketNumberSpace::ApplicationData),
        1
    );
}

#[test]
fn consecutive_ack_only_packets_force_ping_test() {
    let mut packer = packer(endpoint::Type::Server);

    for count in 1..=MAX_NON_ACK_ELICITING_ACKS {
        packer
            .collaborators_mut()
            .acks
            .pend(EncryptionLevel::OneRtt, VarInt::from_u8(count as u8));
        let packet = packer.pack_packet().unwrap().expect("a packet");
        assert!(!packet.ack_elicitation().is_ack_eliciting());
        assert_eq!(packer.non_ack_eliciting_acks(), count);
    }

    packer
        .collaborators_mut()
        .acks
        .pend(EncryptionLevel::OneRtt, VarInt::from_u8(100));
    let packet = packer.pack_packet().unwrap().expect("a packet");

    assert_eq!(packet.frames.len(), 2);
    assert!(matches!(packet.frames[0], Frame::Ack(_)));
    assert!(matches!(packet.frames[1], Frame::Ping(_)));
    assert_eq!(packer.non_ack_eliciting_acks(), 0);
}

#[test]
fn stream_frame_length_elision_test() {
    let mut packer = packer(endpoint::Type::Server);
    {
        let collaborators = packer.collaborators_mut();
        collaborators.framer.queue_control(
            frame::NewToken {
                token: Bytes::from(vec![0xcc; 46]),
            }
            .into(),
        );
        collaborators.framer.queue_stream(stream_frame(0, 350));
        collaborators.framer.queue_stream(stream_frame(350, 350));
        collaborators.framer.queue_stream(stream_frame(700, 337));
    }

    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert!(packet.len() <= packer.max_packet_size());

    assert!(matches!(packet.frames[0], Frame::NewToken(_)));
    let streams: Vec<_> = packet
        .frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Stream(stream) => Some(stream),
            _ => None,
        })
        .collect();
    assert_eq!(streams.len(), 3);
    // exactly one frame elides its Length field, and it is the last one
    assert!(streams[..2].iter().all(|stream| !stream.is_last_frame));
    assert!(streams[2].is_last_frame);
    assert!(matches!(
        packet.frames.last(),
        Some(Frame::Stream(stream)) if stream.is_last_frame
    ));

    let sealer = packer.collaborators_mut().sealers.one_rtt.unwrap();
    assert_eq!(without_padding(open(&packet, &sealer)), packet.frames);
}

#[test]
fn retransmission_split_test() {
    let mut packer = packer(endpoint::Type::Server);
    packer.handle_transport_parameters(&TransportParameters {
        max_udp_payload_size: Some(VarInt::from_u16(1000)),
    });
    assert_eq!(packer.max_packet_size(), 1000);

    let mut original = stream_frame(0, 1400);
    original.is_fin = true;
    let lost = SentPacket {
        packet_number: VarInt::from_u8(7),
        encryption_level: EncryptionLevel::OneRtt,
        frames: vec![Frame::Stream(original.clone())],
        len: 1410,
    };

    let packets = packer.pack_retransmission(lost).unwrap();
    assert_eq!(packets.len(), 2);

    let mut chunks = Vec::new();
    for (index, packet) in packets.iter().enumerate() {
        assert_eq!(packet.encryption_level(), EncryptionLevel::OneRtt);
        assert_eq!(packet.packet_number, VarInt::new(index as u64).unwrap());
        assert!(packet.len() <= 1000);

        match &packet.frames[..] {
            [Frame::Stream(stream)] => {
                assert!(stream.is_last_frame);
                chunks.push(stream.clone());
            }
            frames => panic!("unexpected frames {frames:?}"),
        }
    }

    // the split preserves the aggregate byte range
    assert_eq!(chunks[0].offset, VarInt::ZERO);
    assert!(!chunks[0].is_fin);
    assert_eq!(chunks[1].offset.as_u64(), chunks[0].data.len() as u64);
    assert!(chunks[1].is_fin);
    let mut data = chunks[0].data.to_vec();
    data.extend_from_slice(&chunks[1].data);
    assert_eq!(Bytes::from(data), original.data);
}

#[test]
fn retransmission_keeps_crypto_frames_whole_test() {
    let mut packer = packer(endpoint::Type::Client);
    packer.collaborators_mut().initial_stream.queue(&[0x42; 800]);
    let packet = packer.pack_packet().unwrap().expect("a packet");
    let lost = packet.sent_packet();
    drop(packet);

    let packets = packer.pack_retransmission(lost.clone()).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].encryption_level(), EncryptionLevel::Initial);
    // fresh packet number, identical frames
    assert_eq!(packets[0].packet_number, VarInt::new(1).unwrap());
    assert_eq!(packets[0].frames, lost.frames);
}

#[test]
fn retransmission_requires_keys_test() {
    let mut packer = packer(endpoint::Type::Client);
    packer.collaborators_mut().initial_stream.queue(&[0x42; 100]);
    let lost = packer.pack_packet().unwrap().expect("a packet").sent_packet();

    packer
        .collaborators_mut()
        .sealers
        .discard(EncryptionLevel::Initial);

    assert!(matches!(
        packer.pack_retransmission(lost),
        Err(Error::KeysUnavailable(EncryptionLevel::Initial))
    ));
}

#[test]
fn change_dest_connection_id_test() {
    let mut packer = packer(endpoint::Type::Server);

    packer.collaborators_mut().framer.queue_control(frame::Ping.into());
    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert_eq!(packet.header.destination_connection_id(), &dcid());

    let updated = ConnectionId::try_from_bytes(&[0xee; 16]).unwrap();
    packer.change_dest_connection_id(updated);

    packer.collaborators_mut().framer.queue_control(frame::Ping.into());
    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert_eq!(packet.header.destination_connection_id(), &updated);
}

#[test]
fn nothing_to_send_test() {
    let mut packer = packer(endpoint::Type::Client);

    assert!(packer.pack_packet().unwrap().is_none());

    // no packet number was consumed in any space
    let collaborators = packer.collaborators_mut();
    assert_eq!(collaborators.packet_numbers.next(PacketNumberSpace::Initial), 0);
    assert_eq!(collaborators.packet_numbers.next(PacketNumberSpace::Handshake), 0);
    assert_eq!(
        collaborators
            .packet_numbers
            .next(PacketNumberSpace::ApplicationData),
        0
    );
}

#[test]
fn crypto_level_precedence_test() {
    let mut packer = packer(endpoint::Type::Client);
    {
        let collaborators = packer.collaborators_mut();
        collaborators.acks.pend(EncryptionLevel::Initial, VarInt::from_u8(1));
        collaborators.handshake_stream.queue(&[0x42; 100]);
    }

    // a pending Initial ACK outranks Handshake crypto data
    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert_eq!(packet.encryption_level(), EncryptionLevel::Initial);
    assert_eq!(packet.frames.len(), 1);
    assert!(matches!(packet.frames[0], Frame::Ack(_)));

    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert_eq!(packet.encryption_level(), EncryptionLevel::Handshake);
    assert!(matches!(packet.frames[0], Frame::Crypto(_)));
}

#[test]
fn handshake_ack_and_crypto_test() {
    let mut packer = packer(endpoint::Type::Server);
    {
        let collaborators = packer.collaborators_mut();
        collaborators.acks.pend(EncryptionLevel::Handshake, VarInt::from_u8(3));
        collaborators.handshake_stream.queue(&[0x42; 2000]);
    }

    let packet = packer.pack_packet().unwrap().expect("a packet");

    assert_eq!(packet.encryption_level(), EncryptionLevel::Handshake);
    // the ACK leads, the CRYPTO frame fills the remaining budget
    assert_eq!(packet.frames.len(), 2);
    assert!(matches!(packet.frames[0], Frame::Ack(_)));
    match &packet.frames[1] {
        Frame::Crypto(cf) => assert!(cf.data.len() < 2000),
        other => panic!("unexpected frame {other:?}"),
    }
    assert_eq!(packet.len(), packer.max_packet_size());

    let sealer = packer.collaborators_mut().sealers.handshake.unwrap();
    assert_eq!(without_padding(open(&packet, &sealer)), packet.frames);
}

#[test]
fn keys_unavailable_test() {
    let mut packer = packer(endpoint::Type::Client);
    {
        let collaborators = packer.collaborators_mut();
        collaborators.initial_stream.queue(&[0x42; 100]);
        collaborators.sealers.discard(EncryptionLevel::Initial);
    }

    assert!(matches!(
        packer.pack_packet(),
        Err(Error::KeysUnavailable(EncryptionLevel::Initial))
    ));

    // the failure left no gap in the packet number sequence
    {
        let collaborators = packer.collaborators_mut();
        assert_eq!(collaborators.packet_numbers.next(PacketNumberSpace::Initial), 0);
        collaborators
            .sealers
            .install(EncryptionLevel::Initial, crypto_testing::Sealer::new(0x11));
    }

    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert_eq!(packet.packet_number, VarInt::ZERO);
}

#[test]
fn packet_number_desync_test() {
    struct Desync;

    impl PacketNumberManager for Desync {
        fn peek(&self, _space: PacketNumberSpace) -> (VarInt, PacketNumberLen) {
            (VarInt::from_u8(1), PacketNumberLen::Len2)
        }

        fn pop(&mut self, _space: PacketNumberSpace) -> VarInt {
            VarInt::from_u8(2)
        }
    }

    let mut packer: Packer<Desync, _, CryptoBuffer, _, _> = Packer::new(
        Config::new(crate::packet::VERSION, dcid(), scid(), endpoint::Type::Server),
        buffer::Pool::default(),
        Desync,
        crypto_testing::Sealers::default(),
        CryptoBuffer::default(),
        CryptoBuffer::default(),
        AckSource::default(),
        Framer::default(),
    );

    packer.collaborators_mut().framer.queue_control(frame::Ping.into());

    assert!(matches!(
        packer.pack_packet(),
        Err(Error::PacketNumberDesync { peeked, popped })
            if peeked == VarInt::from_u8(1) && popped == VarInt::from_u8(2)
    ));
}

#[test]
fn oversized_frame_source_test() {
    struct Greedy;

    impl FrameSource for Greedy {
        fn append_control_frames(&mut self, frames: &mut Vec<Frame>, _budget: usize) -> usize {
            // misbehaves: ignores the budget entirely
            let frame = Frame::NewToken(frame::NewToken {
                token: Bytes::from(vec![0xcc; 2000]),
            });
            let len = frame.encoding_size();
            frames.push(frame);
            len
        }

        fn append_stream_frames(&mut self, _frames: &mut Vec<Frame>, _budget: usize) -> usize {
            0
        }
    }

    let mut packer: Packer<_, _, CryptoBuffer, _, Greedy> = Packer::new(
        Config::new(crate::packet::VERSION, dcid(), scid(), endpoint::Type::Server),
        buffer::Pool::default(),
        PacketNumbers::default(),
        crypto_testing::Sealers::default(),
        CryptoBuffer::default(),
        CryptoBuffer::default(),
        AckSource::default(),
        Greedy,
    );

    assert!(matches!(
        packer.pack_packet(),
        Err(Error::OversizedPacket { .. })
    ));
}

#[test]
fn short_packet_minimum_payload_test() {
    let mut packer = packer(endpoint::Type::Server);
    {
        let collaborators = packer.collaborators_mut();
        collaborators
            .packet_numbers
            .set_len(PacketNumberSpace::ApplicationData, PacketNumberLen::Len1);
        collaborators.framer.queue_control(frame::Ping.into());
    }

    let packet = packer.pack_packet().unwrap().expect("a packet");

    // header(1 + 8 dcid + 1 pn) + padding(2) + ping(1) + tag(16)
    assert_eq!(packet.len(), 10 + 2 + 1 + 16);

    // the header protection sample window is in bounds
    let pn_offset = packet.header.encoding_size() - 1;
    assert!(pn_offset + 4 + crypto::HEADER_PROTECTION_SAMPLE_LEN <= packet.len());

    let sealer = packer.collaborators_mut().sealers.one_rtt.unwrap();
    let frames = open(&packet, &sealer);
    assert_eq!(
        frames,
        vec![
            Frame::Padding(frame::Padding { length: 2 }),
            Frame::Ping(frame::Ping),
        ]
    );
}

#[test]
fn pack_connection_close_test() {
    let close = frame::ConnectionClose {
        error_code: VarInt::from_u8(0x0a),
        frame_type: Some(VarInt::ZERO),
        reason: Bytes::from_static(b"bye"),
    };

    let mut packer = packer(endpoint::Type::Server);
    let packet = packer.pack_connection_close(close.clone()).unwrap();
    assert_eq!(packet.encryption_level(), EncryptionLevel::OneRtt);
    assert_eq!(packet.frames, vec![Frame::ConnectionClose(close.clone())]);

    // before 1-RTT keys exist, the close goes out at the default level
    let mut packer = packer_without_one_rtt();
    let packet = packer.pack_connection_close(close.clone()).unwrap();
    assert_eq!(packet.encryption_level(), EncryptionLevel::Handshake);
}

fn packer_without_one_rtt() -> TestPacker {
    let mut packer = packer(endpoint::Type::Client);
    packer
        .collaborators_mut()
        .sealers
        .discard(EncryptionLevel::OneRtt);
    packer
}

#[test]
fn transport_parameter_clamp_test() {
    let mut packer = packer(endpoint::Type::Server);
    let initial = packer.max_packet_size();

    // a larger advertisement never grows the budget
    packer.handle_transport_parameters(&TransportParameters {
        max_udp_payload_size: Some(VarInt::from_u32(65_527)),
    });
    assert_eq!(packer.max_packet_size(), initial);

    packer.handle_transport_parameters(&TransportParameters {
        max_udp_payload_size: Some(VarInt::from_u16(1200)),
    });
    assert_eq!(packer.max_packet_size(), 1200);

    packer.handle_transport_parameters(&TransportParameters {
        max_udp_payload_size: None,
    });
    assert_eq!(packer.max_packet_size(), 1200);
}

#[test]
fn set_token_test() {
    let mut packer = packer(endpoint::Type::Client);
    packer.set_token(Bytes::from_static(b"retry token"));
    packer.collaborators_mut().initial_stream.queue(&[0x42; 32]);

    let packet = packer.pack_packet().unwrap().expect("a packet");
    match &packet.header {
        Header::Initial { token, .. } => assert_eq!(token, &Bytes::from_static(b"retry token")),
        other => panic!("unexpected header {other:?}"),
    }
}

#[test]
fn server_initial_carries_no_token_test() {
    let mut packer = packer(endpoint::Type::Server);
    packer.set_token(Bytes::from_static(b"retry token"));
    packer.collaborators_mut().initial_stream.queue(&[0x42; 32]);

    let packet = packer.pack_packet().unwrap().expect("a packet");
    match &packet.header {
        Header::Initial { token, .. } => assert!(token.is_empty()),
        other => panic!("unexpected header {other:?}"),
    }
    // servers do not pad their Initial packets to the client minimum
    assert!(packet.len() < MIN_INITIAL_PACKET_LEN);
}

#[test]
fn one_rtt_round_trip_test() {
    let mut packer = packer(endpoint::Type::Server);
    {
        let collaborators = packer.collaborators_mut();
        collaborators.acks.pend(EncryptionLevel::OneRtt, VarInt::from_u8(42));
        collaborators.framer.queue_control(
            frame::MaxData {
                maximum_data: VarInt::from_u32(1 << 20),
            }
            .into(),
        );
        collaborators.framer.queue_stream(stream_frame(0, 700));
    }

    let packet = packer.pack_packet().unwrap().expect("a packet");
    assert!(packet.len() <= packer.max_packet_size());
    assert!(matches!(packet.frames[0], Frame::Ack(_)));

    let sealer = packer.collaborators_mut().sealers.one_rtt.unwrap();
    assert_eq!(without_padding(open(&packet, &sealer)), packet.frames);
}

#[test]
fn packet_numbers_are_contiguous_test() {
    let mut packer = packer(endpoint::Type::Server);

    for expected in 0..4u8 {
        packer.collaborators_mut().framer.queue_control(frame::Ping.into());
        let packet = packer.pack_packet().unwrap().expect("a packet");
        assert_eq!(packet.packet_number, VarInt::from_u8(expected));
    }
}
