//! # Datagram Codec
//!
//! Adapts the packet codec to `tokio_util::codec` so a transport can run it
//! over a framed UDP socket. Each read buffer holds exactly one datagram;
//! there is no length prefix and no stream reassembly.

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{parse_datagram, Perspective};
use crate::protocol::packet_number::PacketNumber;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    perspective: Perspective,
}

impl PacketCodec {
    pub fn new(perspective: Perspective) -> Self {
        Self { perspective }
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.is_empty() {
            return Ok(None);
        }
        // zero-copy: frames keep slices of the datagram
        let datagram = src.split().freeze();
        parse_datagram(datagram, self.perspective, PacketNumber::default()).map(Some)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        packet.encode(dst)
    }
}
