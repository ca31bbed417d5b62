//! Property-based tests using proptest
//!
//! These tests validate codec invariants across randomly generated packets
//! and arbitrary garbage input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use gquic_codec::core::frame::{
    BlockedFrame, Frame, PaddingFrame, PingFrame, RstStreamFrame, WindowUpdateFrame,
};
use gquic_codec::core::packet::{NegotiationPacket, Packet, RegularPacket, ResetPacket};
use gquic_codec::protocol::connection_id::ConnectionId;
use gquic_codec::protocol::dispatcher::{parse_packet, Perspective};
use gquic_codec::protocol::packet_number::{PacketNumber, PacketNumberLen};
use gquic_codec::protocol::socket_address::SocketAddress;
use gquic_codec::protocol::tag::{QuicTag, Tag};
use gquic_codec::protocol::version::{get_versions, Version};
use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

fn connection_id() -> impl Strategy<Value = ConnectionId> {
    any::<[u8; 8]>().prop_map(ConnectionId::new)
}

fn socket_address() -> impl Strategy<Value = SocketAddress> {
    prop_oneof![
        (any::<[u8; 4]>(), any::<u16>())
            .prop_map(|(ip, port)| SocketAddress::new(SocketAddr::from((Ipv4Addr::from(ip), port)))),
        (any::<[u8; 16]>(), any::<u16>())
            .prop_map(|(ip, port)| SocketAddress::new(SocketAddr::from((Ipv6Addr::from(ip), port)))),
    ]
}

fn non_padding_frame() -> impl Strategy<Value = Box<dyn Frame>> {
    prop_oneof![
        any::<()>().prop_map(|_| Box::new(PingFrame::new()) as Box<dyn Frame>),
        (any::<u32>(), any::<u64>(), any::<u32>()).prop_map(|(stream_id, byte_offset, error_code)| {
            Box::new(RstStreamFrame {
                stream_id,
                byte_offset,
                error_code,
            }) as Box<dyn Frame>
        }),
        (any::<u32>(), any::<u64>()).prop_map(|(stream_id, byte_offset)| {
            Box::new(WindowUpdateFrame {
                stream_id,
                byte_offset,
            }) as Box<dyn Frame>
        }),
        any::<u32>().prop_map(|stream_id| Box::new(BlockedFrame { stream_id }) as Box<dyn Frame>),
    ]
}

fn regular_packet() -> impl Strategy<Value = RegularPacket> {
    (
        connection_id(),
        0u64..=PacketNumber::MAX_WIRE,
        proptest::option::of(any::<[u8; 32]>()),
        proptest::option::of(prop::sample::select(get_versions().to_vec())),
        prop::collection::vec(non_padding_frame(), 0..8),
        proptest::option::of(1usize..64),
    )
        .prop_map(|(cid, pn, nonce, version, frames, padding)| {
            let mut packet = RegularPacket::new(cid, PacketNumber::new(pn), nonce);
            if let Some(version) = version {
                packet.set_version(version);
            }
            packet.add_frames(frames);
            if let Some(len) = padding {
                packet.add_frame(PaddingFrame::with_len(len));
            }
            packet
        })
}

// Property: identifiers and addresses survive a round trip
proptest! {
    #[test]
    fn prop_primitive_roundtrip(cid in connection_id(), pn in any::<u64>(), addr in socket_address()) {
        prop_assert_eq!(ConnectionId::from_slice(&cid.to_bytes()).unwrap(), cid);
        prop_assert_eq!(PacketNumber::from_slice(&PacketNumber::new(pn).to_bytes()).unwrap(), PacketNumber::new(pn));
        prop_assert_eq!(SocketAddress::from_slice(&addr.to_bytes()).unwrap(), addr);
    }
}

// Property: tag tables come out sorted whatever the insertion order
proptest! {
    #[test]
    fn prop_tag_table_sorted(entries in prop::collection::vec((any::<[u8; 4]>(), prop::collection::vec(any::<u8>(), 0..16)), 0..12)) {
        let mut tag = QuicTag::new(Tag::new(*b"CHLO"));
        for (name, value) in &entries {
            tag.set_tag(Tag::new(*name), value.clone());
        }
        let bytes = tag.to_bytes().unwrap();

        let count = usize::from(u16::from_le_bytes([bytes[4], bytes[5]]));
        prop_assert_eq!(count, tag.len());
        let names: Vec<u32> = (0..count)
            .map(|i| {
                let at = 8 + i * 8;
                u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            })
            .collect();
        prop_assert!(names.windows(2).all(|w| w[0] < w[1]));

        prop_assert_eq!(QuicTag::from_bytes(&bytes).unwrap(), tag);
    }
}

// Property: regular packets round trip and dispatch to the same value
proptest! {
    #[test]
    fn prop_regular_roundtrip(packet in regular_packet()) {
        let bytes = packet.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), packet.encoded_len());

        let direct = RegularPacket::from_bytes(&bytes, PacketNumber::default()).unwrap();
        prop_assert_eq!(&direct, &packet);

        let dispatched = parse_packet(&bytes, Perspective::Server).unwrap();
        prop_assert_eq!(dispatched, Packet::Regular(direct));
    }
}

// Property: any packet number either encodes and restores exactly or is refused
proptest! {
    #[test]
    fn prop_packet_number_never_silently_truncated(value in any::<u64>()) {
        let packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(value), None);
        match packet.to_bytes() {
            Ok(bytes) => {
                prop_assert!(value <= PacketNumber::MAX_WIRE);
                let decoded = RegularPacket::from_bytes(&bytes, PacketNumber::default()).unwrap();
                prop_assert_eq!(decoded.packet_number().value(), value);
            }
            Err(_) => prop_assert!(value > PacketNumber::MAX_WIRE),
        }
    }
}

// Property: reset packets round trip and dispatch the same from either side
proptest! {
    #[test]
    fn prop_reset_roundtrip(cid in connection_id(), proof in any::<[u8; 32]>(), pn in any::<u64>(), addr in socket_address()) {
        let packet = ResetPacket::from_parts(cid, proof, PacketNumber::new(pn), addr);
        let bytes = packet.to_bytes().unwrap();

        prop_assert_eq!(&ResetPacket::from_bytes(&bytes).unwrap(), &packet);
        prop_assert_eq!(parse_packet(&bytes, Perspective::Client).unwrap(), Packet::Reset(packet.clone()));
        prop_assert_eq!(parse_packet(&bytes, Perspective::Server).unwrap(), Packet::Reset(packet));
    }
}

// Property: negotiation packets round trip for any non-empty version list
proptest! {
    #[test]
    fn prop_negotiation_roundtrip(cid in connection_id(), versions in prop::collection::vec(any::<[u8; 4]>(), 1..16)) {
        let versions: Vec<Version> = versions.into_iter().map(Version::new).collect();
        let packet = NegotiationPacket::new(cid, versions);
        let bytes = packet.to_bytes().unwrap();

        prop_assert_eq!(&NegotiationPacket::from_bytes(&bytes).unwrap(), &packet);
        prop_assert_eq!(parse_packet(&bytes, Perspective::Client).unwrap(), Packet::Negotiation(packet));
    }
}

// Property: a 1 byte truncation within 128 of the previous number reconstructs exactly
proptest! {
    #[test]
    fn prop_reconstruct_one_byte(previous in 128u64..u64::MAX - 128, delta in -127i64..=127) {
        let actual = previous.checked_add_signed(delta).unwrap();
        let reconstructed = PacketNumber::reconstruct(actual & 0xff, PacketNumberLen::One, PacketNumber::new(previous));
        prop_assert_eq!(reconstructed, PacketNumber::new(actual));
    }
}

// Property: truncated encodings decode back given a nearby previous number
proptest! {
    #[test]
    fn prop_truncated_roundtrip(pn in 1u64 << 20..1u64 << 40, gap in 0u64..1000) {
        let packet_number = PacketNumber::new(pn);
        let largest_acked = PacketNumber::new(pn - gap);
        let len = PacketNumberLen::for_packet(packet_number, largest_acked);

        let mut buf = Vec::new();
        packet_number.encode_truncated(len, &mut buf);
        prop_assert_eq!(buf.len(), len.bytes());

        let decoded = PacketNumber::decode_truncated(&mut buf.as_slice(), len, largest_acked).unwrap();
        prop_assert_eq!(decoded, packet_number);
    }
}

// Property: arbitrary bytes never panic the dispatcher
proptest! {
    #[test]
    fn prop_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = parse_packet(&data, Perspective::Client);
        let _ = parse_packet(&data, Perspective::Server);
        let _ = QuicTag::from_bytes(&data);
        let _ = SocketAddress::from_slice(&data);
    }
}

// Property: flipping one byte of a valid packet never panics
proptest! {
    #[test]
    fn prop_mutated_packets_never_panic(packet in regular_packet(), index in any::<prop::sample::Index>(), byte in any::<u8>()) {
        let mut bytes = packet.to_bytes().unwrap().to_vec();
        let at = index.index(bytes.len());
        bytes[at] = byte;
        let _ = parse_packet(&bytes, Perspective::Server);
        let _ = gquic_codec::core::frame::decode_frames(Bytes::from(bytes));
    }
}
