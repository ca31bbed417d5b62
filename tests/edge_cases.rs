#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for hostile and boundary input
//! Every rejected buffer must surface a typed error, never a panic or a partial packet

use bytes::{BufMut, Bytes, BytesMut};
use gquic_codec::core::frame::{
    decode_frames, ConnectionCloseFrame, GoAwayFrame, PaddingFrame, PingFrame, FRAME_TYPE_PING,
};
use gquic_codec::core::packet::{flags, NegotiationPacket, RegularPacket, ResetPacket};
use gquic_codec::error::{constants, ProtocolError};
use gquic_codec::protocol::connection_id::ConnectionId;
use gquic_codec::protocol::dispatcher::{parse_packet, Perspective};
use gquic_codec::protocol::packet_number::{PacketNumber, PacketNumberLen};
use gquic_codec::protocol::socket_address::SocketAddress;
use gquic_codec::protocol::tag::{QuicTag, Tag};
use gquic_codec::protocol::version::get_version;

// ============================================================================
// PACKET TRUNCATION
// ============================================================================

#[test]
fn test_reset_truncated_at_every_offset() {
    let packet = ResetPacket::from_parts(
        ConnectionId::random(),
        [7u8; 32],
        PacketNumber::new(99),
        SocketAddress::new("[2001:db8::2]:443".parse().unwrap()),
    );
    let bytes = packet.to_bytes().unwrap();

    for cut in 0..bytes.len() {
        let result = parse_packet(&bytes[..cut], Perspective::Server);
        assert!(
            matches!(result, Err(ProtocolError::MalformedInput(_))),
            "cut at {cut}: {result:?}"
        );
    }
}

#[test]
fn test_regular_truncated_packet_number() {
    let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(5), None);
    packet.set_packet_number_len(PacketNumberLen::Six);
    let bytes = packet.to_bytes().unwrap();
    assert_eq!(bytes.len(), 1 + 8 + 6);

    assert!(matches!(
        parse_packet(&bytes[..12], Perspective::Server),
        Err(ProtocolError::MalformedInput(constants::ERR_SHORT_PACKET_NUMBER))
    ));
}

#[test]
fn test_regular_missing_nonce_bytes() {
    let mut bytes = BytesMut::new();
    bytes.put_u8(flags::CONNECTION_ID | flags::DIVERSIFICATION_NONCE);
    bytes.put_slice(&[0u8; 8]);
    bytes.put_slice(&[0u8; 31]);
    assert!(matches!(
        parse_packet(&bytes, Perspective::Client),
        Err(ProtocolError::MalformedInput(constants::ERR_SHORT_NONCE))
    ));
}

// ============================================================================
// FLAGS
// ============================================================================

#[test]
fn test_reserved_bit_rejected_for_every_variant() {
    let cid = ConnectionId::random();
    let reset = ResetPacket::from_parts(
        cid,
        [1u8; 32],
        PacketNumber::new(1),
        SocketAddress::new("10.1.2.3:53".parse().unwrap()),
    )
    .to_bytes()
    .unwrap();
    let negotiation = NegotiationPacket::from_connection_id(cid).to_bytes().unwrap();
    let regular = RegularPacket::new(cid, PacketNumber::new(1), None).to_bytes().unwrap();

    for (bytes, perspective) in [
        (reset, Perspective::Server),
        (negotiation, Perspective::Client),
        (regular, Perspective::Server),
    ] {
        let mut bytes = bytes.to_vec();
        bytes[0] |= flags::UNUSED;
        assert!(matches!(
            parse_packet(&bytes, perspective),
            Err(ProtocolError::MalformedInput(constants::ERR_RESERVED_FLAG))
        ));
    }
}

#[test]
fn test_multipath_bit_is_ignored() {
    let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(3), None);
    packet.add_frame(PingFrame::new());
    let mut bytes = packet.to_bytes().unwrap().to_vec();
    bytes[0] |= flags::MULTIPATH;

    let decoded = parse_packet(&bytes, Perspective::Server).unwrap();
    let regular = decoded.as_regular().unwrap();
    assert_eq!(regular.flag() & flags::MULTIPATH, flags::MULTIPATH);
    assert_eq!(regular.packet_number(), PacketNumber::new(3));
    assert_eq!(regular.frames().len(), 1);
}

// ============================================================================
// RESET TAGS
// ============================================================================

fn reset_datagram(tag: &QuicTag) -> Vec<u8> {
    let mut bytes = BytesMut::new();
    bytes.put_u8(flags::RESET_PACKET);
    ConnectionId::random().encode(&mut bytes);
    tag.encode(&mut bytes).unwrap();
    bytes.to_vec()
}

#[test]
fn test_reset_each_required_tag() {
    let address = SocketAddress::new("4.31.198.44:443".parse().unwrap());
    let entries = [
        (Tag::RNON, Bytes::from_static(&[0u8; 32])),
        (Tag::RSEQ, PacketNumber::new(1).to_bytes()),
        (Tag::CADR, address.to_bytes()),
    ];

    for skip in 0..entries.len() {
        let mut tag = QuicTag::new(Tag::PRST);
        for (i, (name, value)) in entries.iter().enumerate() {
            if i != skip {
                tag.set_tag(*name, value.clone());
            }
        }
        let missing = entries[skip].0;
        assert!(matches!(
            parse_packet(&reset_datagram(&tag), Perspective::Client),
            Err(ProtocolError::MissingTag(t)) if t == missing
        ));
    }
}

#[test]
fn test_reset_unknown_address_family() {
    let mut tag = QuicTag::new(Tag::PRST);
    tag.set_tag(Tag::RNON, Bytes::from_static(&[0u8; 32]));
    tag.set_tag(Tag::RSEQ, PacketNumber::new(1).to_bytes());
    tag.set_tag(Tag::CADR, Bytes::from_static(&[0x17, 0x00, 1, 2, 3, 4, 0, 80]));

    assert!(matches!(
        parse_packet(&reset_datagram(&tag), Perspective::Server),
        Err(ProtocolError::UnknownAddressFamily(0x0017))
    ));
}

#[test]
fn test_reset_duplicate_tag_on_wire() {
    // name, count = 2, reserved, then RNON twice
    let mut tag_bytes = BytesMut::new();
    tag_bytes.put_slice(b"PRST");
    tag_bytes.put_u16_le(2);
    tag_bytes.put_u16_le(0);
    tag_bytes.put_slice(b"RNON");
    tag_bytes.put_u32_le(1);
    tag_bytes.put_slice(b"RNON");
    tag_bytes.put_u32_le(2);
    tag_bytes.put_slice(&[0xAA, 0xBB]);

    assert!(matches!(
        QuicTag::from_bytes(&tag_bytes),
        Err(ProtocolError::DuplicateTag(t)) if t == Tag::RNON
    ));

    let mut datagram = vec![flags::RESET_PACKET];
    datagram.extend_from_slice(&[0u8; 8]);
    datagram.extend_from_slice(&tag_bytes);
    assert!(matches!(
        parse_packet(&datagram, Perspective::Server),
        Err(ProtocolError::DuplicateTag(_))
    ));
}

// ============================================================================
// FRAMES
// ============================================================================

#[test]
fn test_unknown_frame_fails_the_whole_packet() {
    let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(8), None);
    packet.set_version(get_version());
    packet.add_frame(PingFrame::new());
    let mut bytes = packet.to_bytes().unwrap().to_vec();
    bytes.push(0xEE);
    bytes.push(FRAME_TYPE_PING);

    assert!(matches!(
        decode_frames(Bytes::from_static(&[FRAME_TYPE_PING, 0xEE])),
        Err(ProtocolError::UnknownFrameType(0xEE))
    ));
    assert!(matches!(
        parse_packet(&bytes, Perspective::Server),
        Err(ProtocolError::MalformedInput(constants::ERR_FRAME_PAYLOAD))
    ));
}

#[test]
fn test_truncated_frame_body_is_malformed() {
    let close = ConnectionCloseFrame::new(7, &b"bye"[..]).unwrap();
    let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(8), None);
    packet.add_frame(close);
    let bytes = packet.to_bytes().unwrap();

    assert!(matches!(
        parse_packet(&bytes[..bytes.len() - 1], Perspective::Server),
        Err(ProtocolError::MalformedInput(constants::ERR_SHORT_FRAME))
    ));
}

#[test]
fn test_reason_phrase_limit() {
    let reason = vec![b'x'; usize::from(u16::MAX) + 1];
    assert!(matches!(
        GoAwayFrame::new(1, 0, reason),
        Err(ProtocolError::InvalidValue(constants::ERR_REASON_LENGTH))
    ));
}

#[test]
fn test_empty_payload_has_no_frames() {
    let packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(1), None);
    let decoded = parse_packet(&packet.to_bytes().unwrap(), Perspective::Server).unwrap();
    assert!(decoded.as_regular().unwrap().frames().is_empty());
}

#[test]
fn test_padding_only_payload() {
    let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(1), None);
    packet.add_frame(PaddingFrame::with_len(64));
    let bytes = packet.to_bytes().unwrap();
    assert_eq!(bytes.len(), 1 + 8 + 1 + 64);

    let decoded = parse_packet(&bytes, Perspective::Server).unwrap();
    let frames = decoded.as_regular().unwrap().frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].downcast_ref::<PaddingFrame>().unwrap().len(), 64);
}

// ============================================================================
// PACKET NUMBERS
// ============================================================================

#[test]
fn test_packet_number_value_range() {
    assert!(matches!(
        PacketNumber::try_from(-1i64),
        Err(ProtocolError::InvalidValue(constants::ERR_NEGATIVE_PACKET_NUMBER))
    ));
    assert!(matches!(
        PacketNumber::try_from(i128::from(u64::MAX) + 1),
        Err(ProtocolError::InvalidValue(constants::ERR_PACKET_NUMBER_OVERFLOW))
    ));
    assert_eq!(
        PacketNumber::try_from(i128::from(u64::MAX)).unwrap(),
        PacketNumber::new(u64::MAX)
    );
}

#[test]
fn test_reconstruction_near_u64_max() {
    let previous = PacketNumber::new(u64::MAX - 1);
    let truncated = u64::MAX & 0xff;
    assert_eq!(
        PacketNumber::reconstruct(truncated, PacketNumberLen::One, previous),
        PacketNumber::new(u64::MAX)
    );
}
