//! # Core Codec Components
//!
//! Frames, packets, and the datagram codec adapter.
//!
//! ## Components
//! - **Frame**: the `Frame` trait, the frame registry and the built-in frames
//! - **Packet**: public flags and the regular / reset / negotiation variants
//! - **Codec**: `tokio_util` codec for framed UDP sockets
//!
//! ## Wire Format
//! ```text
//! [Flags(1)] [Connection ID(8)] [Variant body(N)]
//! ```
//!
//! ## Security
//! - Every length is checked against the remaining buffer before reading
//! - Decoding never allocates more than the datagram it was given

pub mod codec;
pub mod frame;
pub mod packet;
