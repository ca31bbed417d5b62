//! # gquic-codec
//!
//! Wire-format codec for Google QUIC: connection IDs, packet numbers, socket
//! addresses, `QuicTag` messages, version tags, frames and the three public
//! packet variants, plus a dispatcher that decodes a raw datagram into the
//! right variant.
//!
//! The codec is synchronous and holds no shared mutable state. Packet number
//! context is passed explicitly, so any number of threads may decode
//! datagrams in parallel.
//!
//! ## Example
//! ```rust
//! use gquic_codec::core::frame::{PaddingFrame, PingFrame};
//! use gquic_codec::core::packet::{Packet, RegularPacket};
//! use gquic_codec::protocol::connection_id::ConnectionId;
//! use gquic_codec::protocol::dispatcher::{parse_packet, Perspective};
//! use gquic_codec::protocol::packet_number::PacketNumber;
//!
//! let mut packet = RegularPacket::new(ConnectionId::random(), PacketNumber::new(1), None);
//! packet.add_frame(PingFrame::new());
//! packet.add_frame(PaddingFrame::with_len(8));
//!
//! let bytes = packet.to_bytes().unwrap();
//! match parse_packet(&bytes, Perspective::Client).unwrap() {
//!     Packet::Regular(decoded) => assert_eq!(decoded.frames().len(), 2),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use crate::config::CodecConfig;
pub use crate::core::codec::PacketCodec;
pub use crate::core::frame::{Frame, FrameRegistry};
pub use crate::core::packet::{NegotiationPacket, Packet, RegularPacket, ResetPacket};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::{parse_packet, PacketParser, Perspective};
