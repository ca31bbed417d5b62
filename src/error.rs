//! # Error Types
//!
//! Error handling for the QUIC wire codec.
//!
//! Every decode failure is surfaced as a typed [`ProtocolError`] to the immediate
//! caller; no partially decoded value is ever returned. Decode failures are
//! expected to be frequent under adversarial input, so the variants on the hot
//! path carry only `&'static str` context or small `Copy` values and never
//! allocate.
//!
//! ## Error Categories
//! - **Structural**: truncated or inconsistent buffers (`MalformedInput`)
//! - **Registry**: unknown frame type bytes, unknown address families
//! - **Tag tables**: missing or duplicated `QuicTag` entries
//! - **Values**: out-of-range numbers (`InvalidValue`)
//! - **Configuration**: loading and validating `CodecConfig`
//!
//! ## Example Usage
//! ```rust
//! use gquic_codec::error::ProtocolError;
//! use gquic_codec::protocol::connection_id::ConnectionId;
//!
//! match ConnectionId::from_slice(&[0x01, 0x02]) {
//!     Err(ProtocolError::MalformedInput(_)) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::protocol::tag::Tag;
use std::io;
use thiserror::Error;

/// Error message constants used on decode paths.
/// Static strings are borrowed, avoiding heap allocations when rejecting datagrams.
pub mod constants {
    /// Buffer truncation
    pub const ERR_SHORT_CONNECTION_ID: &str = "buffer too short for connection ID";
    pub const ERR_SHORT_PACKET_NUMBER: &str = "buffer too short for packet number";
    pub const ERR_SHORT_SOCKET_ADDRESS: &str = "buffer too short for socket address";
    pub const ERR_SHORT_VERSION: &str = "buffer too short for version tag";
    pub const ERR_SHORT_NONCE: &str = "buffer too short for diversification nonce";
    pub const ERR_SHORT_TAG_HEADER: &str = "buffer too short for tag header";
    pub const ERR_SHORT_TAG_TABLE: &str = "buffer too short for tag entry table";
    pub const ERR_SHORT_FRAME: &str = "buffer too short for frame body";
    pub const ERR_EMPTY_PACKET: &str = "empty datagram";

    /// Structural inconsistencies
    pub const ERR_TAG_OFFSETS: &str = "tag value offsets are not monotonic";
    pub const ERR_TAG_OVERRUN: &str = "tag value offset exceeds buffer";
    pub const ERR_TAG_TRAILING: &str = "trailing bytes after tag values";
    pub const ERR_RESERVED_FLAG: &str = "reserved public flag bit is set";
    pub const ERR_NO_CONNECTION_ID: &str = "public flags omit the connection ID";
    pub const ERR_FLAG_VARIANT: &str = "public flags select a different packet variant";
    pub const ERR_VERSION_LIST: &str = "version list is empty or not a multiple of 4 bytes";
    pub const ERR_FRAME_PAYLOAD: &str = "regular packet payload carries an unknown frame type";
    pub const ERR_ADDRESS_LENGTH: &str = "socket address has trailing bytes";
    pub const ERR_NONCE_PROOF_LENGTH: &str = "nonce proof must be 32 bytes";
    pub const ERR_REJECTED_PACKET_NUMBER: &str = "rejected packet number must be 8 bytes";

    /// Value range errors
    pub const ERR_NEGATIVE_PACKET_NUMBER: &str = "packet number must not be negative";
    pub const ERR_PACKET_NUMBER_OVERFLOW: &str = "packet number does not fit in 64 bits";
    pub const ERR_PACKET_NUMBER_WIRE: &str = "packet number exceeds the 48 bit wire range";
    pub const ERR_PACKET_NUMBER_WIDTH: &str = "packet number width must be 1, 2, 4 or 6 bytes";
    pub const ERR_TAG_COUNT: &str = "too many tag entries";
    pub const ERR_TAG_VALUE_SIZE: &str = "tag values exceed 4 GiB";
    pub const ERR_REASON_LENGTH: &str = "frame reason phrase exceeds 65535 bytes";
}

/// ProtocolError is the error type for all codec operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(&'static str),

    #[error("Unknown frame type: 0x{0:02x}")]
    UnknownFrameType(u8),

    #[error("Unknown address family: 0x{0:04x}")]
    UnknownAddressFamily(u16),

    #[error("Missing tag: {0}")]
    MissingTag(Tag),

    #[error("Duplicate tag: {0}")]
    DuplicateTag(Tag),

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
