//! # Packet Dispatcher
//!
//! Picks the packet variant for an incoming datagram from its public flags
//! and hands the body to the matching decoder.
//!
//! | flags                         | client parses  | server parses |
//! |-------------------------------|----------------|---------------|
//! | RESET                         | reset          | reset         |
//! | VERSION, no RESET             | negotiation    | regular       |
//! | neither                       | regular        | regular       |
//!
//! Only a server receives a version field in a regular packet (the client's
//! first flight), and only a client receives a version list, so the
//! [`Perspective`] of the parsing endpoint settles the one ambiguous case.

use crate::config::ParserConfig;
use crate::core::packet::{
    flags, split_flag, NegotiationPacket, Packet, RegularPacket, ResetPacket,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::packet_number::PacketNumber;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// The endpoint doing the parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    Client,
    #[default]
    Server,
}

impl Perspective {
    /// True when a VERSION-flagged, non-reset datagram is a version list.
    const fn expects_version_list(self) -> bool {
        matches!(self, Perspective::Client)
    }
}

/// Decode a datagram with no packet number context.
#[instrument(level = "trace", skip(datagram), fields(len = datagram.len()))]
pub fn parse_packet(datagram: &[u8], perspective: Perspective) -> Result<Packet> {
    parse_datagram(
        Bytes::copy_from_slice(datagram),
        perspective,
        PacketNumber::default(),
    )
}

/// Decode a datagram, reconstructing a regular packet's number against
/// `previous`. Regular packet frames share the datagram's allocation.
///
/// Every rejection is logged at debug level before it is returned.
pub fn parse_datagram(
    datagram: Bytes,
    perspective: Perspective,
    previous: PacketNumber,
) -> Result<Packet> {
    match route(datagram, perspective, previous) {
        Ok(packet) => Ok(packet),
        Err(e) => {
            debug!(error = %e, perspective = ?perspective, "Dropping datagram");
            Err(e)
        }
    }
}

fn route(datagram: Bytes, perspective: Perspective, previous: PacketNumber) -> Result<Packet> {
    let (flag, body) = split_flag(datagram)?;

    if flag & flags::RESET != 0 {
        return ResetPacket::decode(flag, body).map(Packet::Reset);
    }
    if flag & flags::VERSION != 0 && perspective.expects_version_list() {
        return NegotiationPacket::decode(flag, body).map(Packet::Negotiation);
    }
    RegularPacket::decode(flag, body, previous).map(Packet::Regular)
}

/// A [`ParserConfig`] bound to the dispatcher.
///
/// Stateless: the previous packet number is passed on every call, so one
/// parser can serve any number of connections from any thread.
#[derive(Debug, Clone, Default)]
pub struct PacketParser {
    config: ParserConfig,
}

impl PacketParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn perspective(&self) -> Perspective {
        self.config.perspective
    }

    /// Parse a datagram with no previous packet number.
    pub fn parse(&self, datagram: &[u8]) -> Result<Packet> {
        self.parse_bytes(Bytes::copy_from_slice(datagram), PacketNumber::default())
    }

    /// Parse a datagram in the context of the last packet number seen on
    /// its connection.
    ///
    /// # Errors
    /// - `OversizedPacket` if the datagram exceeds `max_packet_size`
    /// - anything the packet decoders return
    pub fn parse_bytes(&self, datagram: Bytes, previous: PacketNumber) -> Result<Packet> {
        if datagram.len() > self.config.max_packet_size {
            warn!(
                len = datagram.len(),
                max = self.config.max_packet_size,
                "Dropping oversized datagram"
            );
            return Err(ProtocolError::OversizedPacket(datagram.len()));
        }

        parse_datagram(datagram, self.config.perspective, previous)
    }
}
