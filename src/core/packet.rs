//! # Packets
//!
//! Every datagram starts with a public flags byte and an 8 byte connection ID.
//! Three variants share that prefix and otherwise have nothing in common:
//!
//! ```text
//! Regular:     [Flags] [CID(8)] [Version(4)]? [Nonce(32)]? [PN(1|2|4|6)] [Frames...]
//! Reset:       [Flags] [CID(8)] [QuicTag "PRST" { RNON, RSEQ, CADR }]
//! Negotiation: [Flags] [CID(8)] [Version(4)]+
//! ```
//!
//! [`Packet`] is the sum of the three; choosing the variant for an incoming
//! datagram is the dispatcher's job (`protocol::dispatcher`).

use crate::config::{DIVERSIFICATION_NONCE_LEN, NONCE_PROOF_LEN};
use crate::core::frame::{self, Frame};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection_id::ConnectionId;
use crate::protocol::packet_number::{PacketNumber, PacketNumberLen};
use crate::protocol::socket_address::SocketAddress;
use crate::protocol::tag::{QuicTag, Tag};
use crate::protocol::version::{get_versions, Version};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

/// Public flag bits.
pub mod flags {
    /// A version field (or version list) follows the connection ID.
    pub const VERSION: u8 = 0x01;
    /// Public reset packet.
    pub const RESET: u8 = 0x02;
    /// A 32 byte diversification nonce follows (server to client).
    pub const DIVERSIFICATION_NONCE: u8 = 0x04;
    /// An 8 byte connection ID is present. Always set in this profile.
    pub const CONNECTION_ID: u8 = 0x08;
    /// Two bits selecting the truncated packet number width.
    pub const PACKET_NUMBER_LEN_MASK: u8 = 0x30;
    pub const PACKET_NUMBER_LEN_SHIFT: u32 = 4;
    /// Reserved for multipath; carried through untouched.
    pub const MULTIPATH: u8 = 0x40;
    /// Must be zero.
    pub const UNUSED: u8 = 0x80;

    /// Flags of every public reset packet.
    pub const RESET_PACKET: u8 = RESET | CONNECTION_ID;
    /// Flags of every version negotiation packet.
    pub const NEGOTIATION_PACKET: u8 = VERSION | CONNECTION_ID;
}

/// Validate the bits every variant agrees on.
pub(crate) fn check_public_flags(flag: u8) -> Result<()> {
    if flag & flags::UNUSED != 0 {
        return Err(ProtocolError::MalformedInput(constants::ERR_RESERVED_FLAG));
    }
    if flag & flags::CONNECTION_ID == 0 {
        return Err(ProtocolError::MalformedInput(constants::ERR_NO_CONNECTION_ID));
    }
    Ok(())
}

/// A decoded or to-be-encoded datagram.
#[derive(Debug, PartialEq)]
pub enum Packet {
    Regular(RegularPacket),
    Reset(ResetPacket),
    Negotiation(NegotiationPacket),
}

impl Packet {
    pub fn flag(&self) -> u8 {
        match self {
            Packet::Regular(p) => p.flag(),
            Packet::Reset(p) => p.flag(),
            Packet::Negotiation(p) => p.flag(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Packet::Regular(p) => p.connection_id(),
            Packet::Reset(p) => p.connection_id(),
            Packet::Negotiation(p) => p.connection_id(),
        }
    }

    /// Variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Regular(_) => "regular",
            Packet::Reset(_) => "reset",
            Packet::Negotiation(_) => "negotiation",
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Regular(p) => p.encoded_len(),
            Packet::Reset(p) => p.encoded_len(),
            Packet::Negotiation(p) => p.encoded_len(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            Packet::Regular(p) => p.encode(buf),
            Packet::Reset(p) => p.encode(buf),
            Packet::Negotiation(p) => p.encode(buf),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn as_regular(&self) -> Option<&RegularPacket> {
        match self {
            Packet::Regular(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_reset(&self) -> Option<&ResetPacket> {
        match self {
            Packet::Reset(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_negotiation(&self) -> Option<&NegotiationPacket> {
        match self {
            Packet::Negotiation(p) => Some(p),
            _ => None,
        }
    }
}

impl From<RegularPacket> for Packet {
    fn from(packet: RegularPacket) -> Self {
        Packet::Regular(packet)
    }
}

impl From<ResetPacket> for Packet {
    fn from(packet: ResetPacket) -> Self {
        Packet::Reset(packet)
    }
}

impl From<NegotiationPacket> for Packet {
    fn from(packet: NegotiationPacket) -> Self {
        Packet::Negotiation(packet)
    }
}

/// Split a datagram into its flags byte and body.
pub(crate) fn split_flag(datagram: Bytes) -> Result<(u8, Bytes)> {
    let flag = *datagram
        .first()
        .ok_or(ProtocolError::MalformedInput(constants::ERR_EMPTY_PACKET))?;
    Ok((flag, datagram.slice(1..)))
}

// ============================================================================
// Regular packets
// ============================================================================

/// A packet carrying frames.
#[derive(Debug, PartialEq)]
pub struct RegularPacket {
    flag: u8,
    connection_id: ConnectionId,
    version: Option<Version>,
    nonce: Option<[u8; DIVERSIFICATION_NONCE_LEN]>,
    packet_number: PacketNumber,
    packet_number_len: PacketNumberLen,
    frames: Vec<Box<dyn Frame>>,
}

impl RegularPacket {
    /// Build a packet with no version and no frames. The packet number is
    /// written at the smallest width that holds it.
    pub fn new(
        connection_id: ConnectionId,
        packet_number: PacketNumber,
        nonce: Option<[u8; DIVERSIFICATION_NONCE_LEN]>,
    ) -> Self {
        let mut packet = Self {
            flag: 0,
            connection_id,
            version: None,
            nonce,
            packet_number,
            packet_number_len: PacketNumberLen::for_value(packet_number),
            frames: Vec::new(),
        };
        packet.flag = packet.compute_flag();
        packet
    }

    fn compute_flag(&self) -> u8 {
        let mut flag = flags::CONNECTION_ID
            | (self.packet_number_len.flag_bits() << flags::PACKET_NUMBER_LEN_SHIFT);
        if self.version.is_some() {
            flag |= flags::VERSION;
        }
        if self.nonce.is_some() {
            flag |= flags::DIVERSIFICATION_NONCE;
        }
        flag | (self.flag & flags::MULTIPATH)
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Attach a version field and set the VERSION flag.
    pub fn set_version(&mut self, version: Version) {
        self.version = Some(version);
        self.flag = self.compute_flag();
    }

    pub fn nonce(&self) -> Option<&[u8; DIVERSIFICATION_NONCE_LEN]> {
        self.nonce.as_ref()
    }

    pub fn set_nonce(&mut self, nonce: [u8; DIVERSIFICATION_NONCE_LEN]) {
        self.nonce = Some(nonce);
        self.flag = self.compute_flag();
    }

    pub fn packet_number(&self) -> PacketNumber {
        self.packet_number
    }

    pub fn packet_number_len(&self) -> PacketNumberLen {
        self.packet_number_len
    }

    /// Override the on-wire packet number width, e.g. with
    /// [`PacketNumberLen::for_packet`] against the largest acknowledged packet.
    pub fn set_packet_number_len(&mut self, len: PacketNumberLen) {
        self.packet_number_len = len;
        self.flag = self.compute_flag();
    }

    pub fn frames(&self) -> &[Box<dyn Frame>] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Box<dyn Frame>> {
        self.frames
    }

    pub fn add_frame<F: Frame>(&mut self, frame: F) {
        self.frames.push(Box::new(frame));
    }

    /// Append frames to the payload, in order.
    pub fn add_frames<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = Box<dyn Frame>>,
    {
        self.frames.extend(frames);
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.connection_id.as_bytes().len()
            + self.version.map_or(0, |_| 4)
            + self.nonce.map_or(0, |_| DIVERSIFICATION_NONCE_LEN)
            + self.packet_number_len.bytes()
            + self.frames.iter().map(|f| f.encoded_len()).sum::<usize>()
    }

    /// Append the packet to `buf`.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidValue` if the packet number is above
    /// [`PacketNumber::MAX_WIRE`]; `buf` is left untouched.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.packet_number.value() > PacketNumber::MAX_WIRE {
            return Err(ProtocolError::InvalidValue(
                constants::ERR_PACKET_NUMBER_WIRE,
            ));
        }
        buf.reserve(self.encoded_len());
        buf.put_u8(self.flag);
        self.connection_id.encode(buf);
        if let Some(version) = &self.version {
            version.encode(buf);
        }
        if let Some(nonce) = &self.nonce {
            buf.put_slice(nonce);
        }
        self.packet_number
            .encode_truncated(self.packet_number_len, buf);
        frame::encode_frames(&self.frames, buf);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode the body that follows `flag`, reconstructing the packet number
    /// against `previous`.
    ///
    /// # Errors
    /// `MalformedInput` on truncation, bad flags or an unknown frame type
    pub fn decode(flag: u8, mut body: Bytes, previous: PacketNumber) -> Result<Self> {
        check_public_flags(flag)?;
        if flag & flags::RESET != 0 {
            return Err(ProtocolError::MalformedInput(constants::ERR_FLAG_VARIANT));
        }
        let connection_id = ConnectionId::decode(&mut body)?;

        let version = if flag & flags::VERSION != 0 {
            Some(Version::decode(&mut body)?)
        } else {
            None
        };

        let nonce = if flag & flags::DIVERSIFICATION_NONCE != 0 {
            if body.remaining() < DIVERSIFICATION_NONCE_LEN {
                return Err(ProtocolError::MalformedInput(constants::ERR_SHORT_NONCE));
            }
            let mut nonce = [0u8; DIVERSIFICATION_NONCE_LEN];
            body.copy_to_slice(&mut nonce);
            Some(nonce)
        } else {
            None
        };

        let packet_number_len = PacketNumberLen::from_flag_bits(
            (flag & flags::PACKET_NUMBER_LEN_MASK) >> flags::PACKET_NUMBER_LEN_SHIFT,
        );
        let packet_number =
            PacketNumber::decode_truncated(&mut body, packet_number_len, previous)?;

        let frames = frame::decode_frames(body).map_err(|e| match e {
            ProtocolError::UnknownFrameType(frame_type) => {
                debug!(frame_type, "Unknown frame type in regular packet");
                ProtocolError::MalformedInput(constants::ERR_FRAME_PAYLOAD)
            }
            other => other,
        })?;

        debug!(
            %connection_id,
            %packet_number,
            frames = frames.len(),
            "Decoded regular packet"
        );

        Ok(Self {
            flag,
            connection_id,
            version,
            nonce,
            packet_number,
            packet_number_len,
            frames,
        })
    }

    /// Decode a whole datagram, flags byte included.
    pub fn from_bytes(datagram: &[u8], previous: PacketNumber) -> Result<Self> {
        let (flag, body) = split_flag(Bytes::copy_from_slice(datagram))?;
        Self::decode(flag, body, previous)
    }
}

// ============================================================================
// Public reset packets
// ============================================================================

/// Tells the peer to abandon a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPacket {
    flag: u8,
    connection_id: ConnectionId,
    tag: QuicTag,
    nonce_proof: [u8; NONCE_PROOF_LEN],
    packet_number: PacketNumber,
    socket_address: SocketAddress,
}

impl ResetPacket {
    /// Wrap an existing `PRST` message.
    ///
    /// # Errors
    /// - `MissingTag` if `RNON`, `RSEQ` or `CADR` is absent
    /// - `MalformedInput` / `UnknownAddressFamily` if an entry does not parse
    pub fn new(connection_id: ConnectionId, tag: QuicTag) -> Result<Self> {
        let nonce_proof: [u8; NONCE_PROOF_LEN] = tag.require(Tag::RNON)?[..]
            .try_into()
            .map_err(|_| ProtocolError::MalformedInput(constants::ERR_NONCE_PROOF_LENGTH))?;

        let rseq = tag.require(Tag::RSEQ)?;
        if rseq.len() != PacketNumber::FULL_LEN {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_REJECTED_PACKET_NUMBER,
            ));
        }
        let packet_number = PacketNumber::from_slice(rseq)?;

        let socket_address = SocketAddress::from_slice(tag.require(Tag::CADR)?)?;

        Ok(Self {
            flag: flags::RESET_PACKET,
            connection_id,
            tag,
            nonce_proof,
            packet_number,
            socket_address,
        })
    }

    /// Build the `PRST` message from its parts.
    pub fn from_parts(
        connection_id: ConnectionId,
        nonce_proof: [u8; NONCE_PROOF_LEN],
        packet_number: PacketNumber,
        socket_address: SocketAddress,
    ) -> Self {
        let mut tag = QuicTag::new(Tag::PRST);
        tag.set_tag(Tag::RNON, Bytes::copy_from_slice(&nonce_proof));
        tag.set_tag(Tag::RSEQ, packet_number.to_bytes());
        tag.set_tag(Tag::CADR, socket_address.to_bytes());
        Self {
            flag: flags::RESET_PACKET,
            connection_id,
            tag,
            nonce_proof,
            packet_number,
            socket_address,
        }
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn tag(&self) -> &QuicTag {
        &self.tag
    }

    pub fn nonce_proof(&self) -> &[u8; NONCE_PROOF_LEN] {
        &self.nonce_proof
    }

    /// The packet number being repudiated.
    pub fn packet_number(&self) -> PacketNumber {
        self.packet_number
    }

    /// The client address as the server observed it.
    pub fn socket_address(&self) -> SocketAddress {
        self.socket_address
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.connection_id.as_bytes().len() + self.tag.encoded_len()
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.flag);
        self.connection_id.encode(buf);
        self.tag.encode(buf)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode the body that follows `flag`. RESET must be set; the version,
    /// nonce and width bits carry nothing here and are kept as received.
    pub fn decode(flag: u8, mut body: Bytes) -> Result<Self> {
        check_public_flags(flag)?;
        if flag & flags::RESET == 0 {
            return Err(ProtocolError::MalformedInput(constants::ERR_FLAG_VARIANT));
        }
        let connection_id = ConnectionId::decode(&mut body)?;
        let tag = QuicTag::decode(&mut body)?;
        if body.has_remaining() {
            return Err(ProtocolError::MalformedInput(constants::ERR_TAG_TRAILING));
        }

        let mut packet = Self::new(connection_id, tag)?;
        packet.flag = flag;
        debug!(
            %connection_id,
            rejected = %packet.packet_number,
            client = %packet.socket_address,
            "Decoded public reset"
        );
        Ok(packet)
    }

    /// Decode a whole datagram, flags byte included.
    pub fn from_bytes(datagram: &[u8]) -> Result<Self> {
        let (flag, body) = split_flag(Bytes::copy_from_slice(datagram))?;
        Self::decode(flag, body)
    }
}

// ============================================================================
// Version negotiation packets
// ============================================================================

/// The server's supported versions, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPacket {
    flag: u8,
    connection_id: ConnectionId,
    versions: Vec<Version>,
}

impl NegotiationPacket {
    pub fn new(connection_id: ConnectionId, versions: Vec<Version>) -> Self {
        Self {
            flag: flags::NEGOTIATION_PACKET,
            connection_id,
            versions,
        }
    }

    /// Advertise every version this implementation supports.
    pub fn from_connection_id(connection_id: ConnectionId) -> Self {
        Self::new(connection_id, get_versions().to_vec())
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.connection_id.as_bytes().len() + self.versions.len() * 4
    }

    /// # Errors
    /// Returns `ProtocolError::InvalidValue` for an empty version list
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.versions.is_empty() {
            return Err(ProtocolError::InvalidValue(constants::ERR_VERSION_LIST));
        }
        buf.reserve(self.encoded_len());
        buf.put_u8(self.flag);
        self.connection_id.encode(buf);
        for version in &self.versions {
            version.encode(buf);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode the body that follows `flag`. VERSION must be set and RESET
    /// clear; the nonce and width bits are kept as received.
    ///
    /// # Errors
    /// `MalformedInput` if the flags name another variant, or the version
    /// block is empty or not a multiple of 4
    pub fn decode(flag: u8, mut body: Bytes) -> Result<Self> {
        check_public_flags(flag)?;
        if flag & (flags::VERSION | flags::RESET) != flags::VERSION {
            return Err(ProtocolError::MalformedInput(constants::ERR_FLAG_VARIANT));
        }
        let connection_id = ConnectionId::decode(&mut body)?;
        if body.is_empty() || body.len() % 4 != 0 {
            return Err(ProtocolError::MalformedInput(constants::ERR_VERSION_LIST));
        }

        let mut versions = Vec::with_capacity(body.len() / 4);
        while body.has_remaining() {
            versions.push(Version::decode(&mut body)?);
        }
        debug!(%connection_id, versions = versions.len(), "Decoded version negotiation");

        Ok(Self {
            flag,
            connection_id,
            versions,
        })
    }

    /// Decode a whole datagram, flags byte included.
    pub fn from_bytes(datagram: &[u8]) -> Result<Self> {
        let (flag, body) = split_flag(Bytes::copy_from_slice(datagram))?;
        Self::decode(flag, body)
    }
}
