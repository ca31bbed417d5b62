//! # Protocol Layer
//!
//! Wire primitives shared by every packet variant, and the dispatcher that
//! turns a datagram into a [`Packet`](crate::core::packet::Packet).
//!
//! ## Components
//! - **ConnectionId**: fixed 8 byte connection identifiers
//! - **PacketNumber**: full-width and truncated packet numbers
//! - **SocketAddress**: family-tagged IP address and port
//! - **QuicTag**: tag-keyed message container (handshake and reset messages)
//! - **Version**: version tags and the supported version list
//! - **Dispatcher**: `parse_packet` and the configured `PacketParser`

pub mod connection_id;
pub mod dispatcher;
pub mod packet_number;
pub mod socket_address;
pub mod tag;
pub mod version;
