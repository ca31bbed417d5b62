//! # Frame Codec
//!
//! Frames populate the (already decrypted) payload of a regular packet.
//!
//! Decoding reads one type byte at a time and dispatches to the decoder
//! registered for it in a [`FrameRegistry`]; the decoder decides how many
//! further bytes it consumes. New frame types are added by registering a
//! decoder, the decode loop itself never changes.
//!
//! ## Default Registry
//! | Type   | Frame              | Body                                          |
//! |--------|--------------------|-----------------------------------------------|
//! | `0x00` | `PADDING`          | rest of the payload                           |
//! | `0x01` | `RST_STREAM`       | stream id (4), byte offset (8), error (4)     |
//! | `0x02` | `CONNECTION_CLOSE` | error (4), reason length (2), reason          |
//! | `0x03` | `GOAWAY`           | error (4), last stream (4), length (2), reason|
//! | `0x04` | `WINDOW_UPDATE`    | stream id (4), byte offset (8)                |
//! | `0x05` | `BLOCKED`          | stream id (4)                                 |
//! | `0x07` | `PING`             | none                                          |
//!
//! All integers are little-endian.
//!
//! A padding frame swallows everything after its type byte, including bytes
//! that would otherwise parse as further frames. Padding always goes last.

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::any::Any;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, trace};

pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_RST_STREAM: u8 = 0x01;
pub const FRAME_TYPE_CONNECTION_CLOSE: u8 = 0x02;
pub const FRAME_TYPE_GOAWAY: u8 = 0x03;
pub const FRAME_TYPE_WINDOW_UPDATE: u8 = 0x04;
pub const FRAME_TYPE_BLOCKED: u8 = 0x05;
pub const FRAME_TYPE_PING: u8 = 0x07;

/// A frame carried in a regular packet payload.
pub trait Frame: fmt::Debug + Send + Sync + 'static {
    /// Type byte that introduces this frame on the wire.
    fn frame_type(&self) -> u8;

    /// Short upper-case name, e.g. `"PING"`.
    fn name(&self) -> &'static str;

    /// Bytes written by [`Frame::encode`], type byte included.
    fn encoded_len(&self) -> usize;

    /// Append the frame, type byte first.
    fn encode(&self, buf: &mut BytesMut);

    fn as_any(&self) -> &dyn Any;

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

impl dyn Frame {
    pub fn downcast_ref<T: Frame>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Frame>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

// Frames compare by wire image.
impl PartialEq for dyn Frame {
    fn eq(&self, other: &Self) -> bool {
        self.frame_type() == other.frame_type() && self.to_bytes() == other.to_bytes()
    }
}

/// Decodes one frame body. Called with the type byte already consumed.
pub type FrameDecoder = fn(&mut Bytes) -> Result<Box<dyn Frame>>;

#[derive(Clone, Copy)]
struct FrameEntry {
    name: &'static str,
    decoder: FrameDecoder,
}

/// Lookup table from type byte to decoder.
#[derive(Clone)]
pub struct FrameRegistry {
    entries: [Option<FrameEntry>; 256],
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .enumerate()
                    .filter_map(|(t, e)| e.map(|e| (format!("0x{t:02x}"), e.name))),
            )
            .finish()
    }
}

impl FrameRegistry {
    /// A registry with no frame types.
    pub fn empty() -> Self {
        Self {
            entries: [None; 256],
        }
    }

    /// A registry with every built-in frame type.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(FRAME_TYPE_PADDING, "PADDING", PaddingFrame::decode_body);
        registry.register(FRAME_TYPE_RST_STREAM, "RST_STREAM", RstStreamFrame::decode_body);
        registry.register(
            FRAME_TYPE_CONNECTION_CLOSE,
            "CONNECTION_CLOSE",
            ConnectionCloseFrame::decode_body,
        );
        registry.register(FRAME_TYPE_GOAWAY, "GOAWAY", GoAwayFrame::decode_body);
        registry.register(
            FRAME_TYPE_WINDOW_UPDATE,
            "WINDOW_UPDATE",
            WindowUpdateFrame::decode_body,
        );
        registry.register(FRAME_TYPE_BLOCKED, "BLOCKED", BlockedFrame::decode_body);
        registry.register(FRAME_TYPE_PING, "PING", PingFrame::decode_body);
        registry
    }

    /// Process-wide default registry, built on first use and never mutated.
    pub fn global() -> &'static FrameRegistry {
        static REGISTRY: OnceLock<FrameRegistry> = OnceLock::new();
        REGISTRY.get_or_init(FrameRegistry::new)
    }

    /// Register a decoder for `frame_type`, returning the name of the entry it
    /// replaced, if any.
    pub fn register(
        &mut self,
        frame_type: u8,
        name: &'static str,
        decoder: FrameDecoder,
    ) -> Option<&'static str> {
        let previous = self.entries[usize::from(frame_type)].replace(FrameEntry { name, decoder });
        debug!(frame_type, name, "Registered frame decoder");
        previous.map(|entry| entry.name)
    }

    pub fn contains(&self, frame_type: u8) -> bool {
        self.entries[usize::from(frame_type)].is_some()
    }

    pub fn name_of(&self, frame_type: u8) -> Option<&'static str> {
        self.entries[usize::from(frame_type)].map(|entry| entry.name)
    }

    /// Decode frames until `payload` is exhausted.
    ///
    /// # Errors
    /// - `UnknownFrameType` for a type byte with no registered decoder
    /// - `MalformedInput` if a frame body is truncated
    pub fn decode_frames(&self, mut payload: Bytes) -> Result<Vec<Box<dyn Frame>>> {
        let mut frames = Vec::new();
        while payload.has_remaining() {
            let frame_type = payload.get_u8();
            let entry = self.entries[usize::from(frame_type)]
                .ok_or(ProtocolError::UnknownFrameType(frame_type))?;
            let frame = (entry.decoder)(&mut payload)?;
            trace!(frame_type, name = entry.name, "Decoded frame");
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Decode a payload with the global registry.
pub fn decode_frames(payload: Bytes) -> Result<Vec<Box<dyn Frame>>> {
    FrameRegistry::global().decode_frames(payload)
}

/// Decode a payload with a caller-supplied registry.
pub fn decode_frames_with(
    registry: &FrameRegistry,
    payload: Bytes,
) -> Result<Vec<Box<dyn Frame>>> {
    registry.decode_frames(payload)
}

/// Concatenate the encodings of `frames` in order.
pub fn encode_frames(frames: &[Box<dyn Frame>], buf: &mut BytesMut) {
    buf.reserve(frames.iter().map(|frame| frame.encoded_len()).sum());
    for frame in frames {
        frame.encode(buf);
    }
}

fn ensure(buf: &Bytes, len: usize) -> Result<()> {
    if buf.remaining() < len {
        return Err(ProtocolError::MalformedInput(constants::ERR_SHORT_FRAME));
    }
    Ok(())
}

fn reason_len(reason: &[u8]) -> Result<u16> {
    u16::try_from(reason.len()).map_err(|_| ProtocolError::InvalidValue(constants::ERR_REASON_LENGTH))
}

fn decode_reason(buf: &mut Bytes) -> Result<Bytes> {
    ensure(buf, 2)?;
    let len = usize::from(buf.get_u16_le());
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

/// Fills the remainder of a packet. `len` counts the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingFrame {
    len: usize,
}

impl Default for PaddingFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl PaddingFrame {
    /// A single padding byte.
    pub fn new() -> Self {
        Self { len: 1 }
    }

    /// Padding covering `len` bytes (at least one).
    pub fn with_len(len: usize) -> Self {
        Self { len: len.max(1) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        let len = 1 + buf.remaining();
        buf.advance(buf.remaining());
        Ok(Box::new(Self { len }))
    }
}

impl Frame for PaddingFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_PADDING
    }

    fn name(&self) -> &'static str {
        "PADDING"
    }

    fn encoded_len(&self) -> usize {
        self.len
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_bytes(0, self.len);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keep-alive with no body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingFrame;

impl PingFrame {
    pub fn new() -> Self {
        Self
    }

    fn decode_body(_buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        Ok(Box::new(Self))
    }
}

impl Frame for PingFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_PING
    }

    fn name(&self) -> &'static str {
        "PING"
    }

    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_PING);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Abruptly terminates one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: u32,
    pub byte_offset: u64,
    pub error_code: u32,
}

impl RstStreamFrame {
    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        ensure(buf, 16)?;
        Ok(Box::new(Self {
            stream_id: buf.get_u32_le(),
            byte_offset: buf.get_u64_le(),
            error_code: buf.get_u32_le(),
        }))
    }
}

impl Frame for RstStreamFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_RST_STREAM
    }

    fn name(&self) -> &'static str {
        "RST_STREAM"
    }

    fn encoded_len(&self) -> usize {
        1 + 16
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_RST_STREAM);
        buf.put_u32_le(self.stream_id);
        buf.put_u64_le(self.byte_offset);
        buf.put_u32_le(self.error_code);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Closes the connection with an error code and reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    error_code: u32,
    reason: Bytes,
}

impl ConnectionCloseFrame {
    /// # Errors
    /// Returns `ProtocolError::InvalidValue` if `reason` exceeds 65535 bytes
    pub fn new(error_code: u32, reason: impl Into<Bytes>) -> Result<Self> {
        let reason = reason.into();
        reason_len(&reason)?;
        Ok(Self { error_code, reason })
    }

    pub fn error_code(&self) -> u32 {
        self.error_code
    }

    pub fn reason(&self) -> &Bytes {
        &self.reason
    }

    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        ensure(buf, 4)?;
        let error_code = buf.get_u32_le();
        let reason = decode_reason(buf)?;
        Ok(Box::new(Self { error_code, reason }))
    }
}

impl Frame for ConnectionCloseFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_CONNECTION_CLOSE
    }

    fn name(&self) -> &'static str {
        "CONNECTION_CLOSE"
    }

    fn encoded_len(&self) -> usize {
        1 + 4 + 2 + self.reason.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_CONNECTION_CLOSE);
        buf.put_u32_le(self.error_code);
        // length checked in `new`
        buf.put_u16_le(self.reason.len() as u16);
        buf.put_slice(&self.reason);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Announces that the sender will open no more streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    error_code: u32,
    last_good_stream_id: u32,
    reason: Bytes,
}

impl GoAwayFrame {
    /// # Errors
    /// Returns `ProtocolError::InvalidValue` if `reason` exceeds 65535 bytes
    pub fn new(error_code: u32, last_good_stream_id: u32, reason: impl Into<Bytes>) -> Result<Self> {
        let reason = reason.into();
        reason_len(&reason)?;
        Ok(Self {
            error_code,
            last_good_stream_id,
            reason,
        })
    }

    pub fn error_code(&self) -> u32 {
        self.error_code
    }

    pub fn last_good_stream_id(&self) -> u32 {
        self.last_good_stream_id
    }

    pub fn reason(&self) -> &Bytes {
        &self.reason
    }

    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        ensure(buf, 8)?;
        let error_code = buf.get_u32_le();
        let last_good_stream_id = buf.get_u32_le();
        let reason = decode_reason(buf)?;
        Ok(Box::new(Self {
            error_code,
            last_good_stream_id,
            reason,
        }))
    }
}

impl Frame for GoAwayFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_GOAWAY
    }

    fn name(&self) -> &'static str {
        "GOAWAY"
    }

    fn encoded_len(&self) -> usize {
        1 + 4 + 4 + 2 + self.reason.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_GOAWAY);
        buf.put_u32_le(self.error_code);
        buf.put_u32_le(self.last_good_stream_id);
        buf.put_u16_le(self.reason.len() as u16);
        buf.put_slice(&self.reason);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Raises the flow control limit of a stream (stream 0: the connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    pub stream_id: u32,
    pub byte_offset: u64,
}

impl WindowUpdateFrame {
    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        ensure(buf, 12)?;
        Ok(Box::new(Self {
            stream_id: buf.get_u32_le(),
            byte_offset: buf.get_u64_le(),
        }))
    }
}

impl Frame for WindowUpdateFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_WINDOW_UPDATE
    }

    fn name(&self) -> &'static str {
        "WINDOW_UPDATE"
    }

    fn encoded_len(&self) -> usize {
        1 + 12
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_WINDOW_UPDATE);
        buf.put_u32_le(self.stream_id);
        buf.put_u64_le(self.byte_offset);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Signals that the sender is blocked by flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedFrame {
    pub stream_id: u32,
}

impl BlockedFrame {
    fn decode_body(buf: &mut Bytes) -> Result<Box<dyn Frame>> {
        ensure(buf, 4)?;
        Ok(Box::new(Self {
            stream_id: buf.get_u32_le(),
        }))
    }
}

impl Frame for BlockedFrame {
    fn frame_type(&self) -> u8 {
        FRAME_TYPE_BLOCKED
    }

    fn name(&self) -> &'static str {
        "BLOCKED"
    }

    fn encoded_len(&self) -> usize {
        1 + 4
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(FRAME_TYPE_BLOCKED);
        buf.put_u32_le(self.stream_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
