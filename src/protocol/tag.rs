//! # QuicTag Tag-Value Messages
//!
//! Tag-keyed container shared by the public reset packet and the handshake
//! messages of the cryptographic layer.
//!
//! ## Wire Format
//! ```text
//! [Name(4)] [Count(2, LE)] [Reserved(2)]
//! [Tag(4)] [EndOffset(4, LE)]   × Count, ascending by tag-as-u32-LE
//! [Values...]                   concatenated in the same order
//! ```
//!
//! Entries are kept in a `BTreeMap` keyed by [`Tag`], whose ordering is the
//! little-endian `u32` value of the four name bytes, so serialization order
//! never depends on insertion order.

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Size of the fixed message header: name, entry count, reserved.
const HEADER_LEN: usize = 8;
/// Size of one entry in the offset table: tag plus end offset.
const ENTRY_LEN: usize = 8;

/// A four byte tag name such as `PRST` or `RNON`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Public reset message.
    pub const PRST: Tag = Tag(*b"PRST");
    /// Public reset nonce proof.
    pub const RNON: Tag = Tag(*b"RNON");
    /// Rejected packet number.
    pub const RSEQ: Tag = Tag(*b"RSEQ");
    /// Client address as observed by the server.
    pub const CADR: Tag = Tag(*b"CADR");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Numeric value used for ordering entries on the wire.
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub(crate) fn decode<B: Buf>(buf: &mut B) -> Self {
        let mut bytes = [0u8; 4];
        buf.copy_to_slice(&mut bytes);
        Self(bytes)
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_u32().cmp(&other.to_u32())
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ' || *b == 0) {
            for b in self.0.iter().filter(|b| **b != 0) {
                write!(f, "{}", *b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08x}", u32::from_be_bytes(self.0))
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// A named tag-value message.
///
/// Owned and mutated through [`QuicTag::set_tag`] before serialization; a
/// value produced by [`QuicTag::decode`] is a snapshot of the wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuicTag {
    name: Tag,
    entries: BTreeMap<Tag, Bytes>,
}

impl QuicTag {
    /// Create an empty message with the given name.
    pub fn new(name: Tag) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> Tag {
        self.name
    }

    /// Set the value for `tag`, replacing any previous value.
    pub fn set_tag(&mut self, tag: Tag, value: impl Into<Bytes>) {
        self.entries.insert(tag, value.into());
    }

    pub fn get_tag(&self, tag: &Tag) -> Option<&Bytes> {
        self.entries.get(tag)
    }

    /// Look up a required entry.
    ///
    /// # Errors
    /// Returns `ProtocolError::MissingTag` if the entry is absent
    pub fn require(&self, tag: Tag) -> Result<&Bytes> {
        self.entries.get(&tag).ok_or(ProtocolError::MissingTag(tag))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Bytes)> {
        self.entries.iter()
    }

    /// Number of bytes [`QuicTag::encode`] will write.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + self.entries.len() * ENTRY_LEN
            + self.entries.values().map(Bytes::len).sum::<usize>()
    }

    /// Serialize the message.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidValue` if the entry count does not fit in
    /// 16 bits or the value block does not fit 32-bit offsets
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| ProtocolError::InvalidValue(constants::ERR_TAG_COUNT))?;

        buf.put_slice(self.name.as_bytes());
        buf.put_u16_le(count);
        buf.put_u16_le(0);

        let mut end_offset: u32 = 0;
        for (tag, value) in &self.entries {
            let len = u32::try_from(value.len())
                .map_err(|_| ProtocolError::InvalidValue(constants::ERR_TAG_VALUE_SIZE))?;
            end_offset = end_offset
                .checked_add(len)
                .ok_or(ProtocolError::InvalidValue(constants::ERR_TAG_VALUE_SIZE))?;
            buf.put_slice(tag.as_bytes());
            buf.put_u32_le(end_offset);
        }

        for value in self.entries.values() {
            buf.put_slice(value);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Parse a message from the front of `buf`, consuming exactly the bytes
    /// its header declares.
    ///
    /// # Errors
    /// - `MalformedInput` on truncation or non-monotonic / overrunning offsets
    /// - `DuplicateTag` if the offset table names a tag twice
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < HEADER_LEN {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_TAG_HEADER,
            ));
        }
        let name = Tag::decode(buf);
        let count = usize::from(buf.get_u16_le());
        buf.advance(2);

        if buf.remaining() < count * ENTRY_LEN {
            return Err(ProtocolError::MalformedInput(constants::ERR_SHORT_TAG_TABLE));
        }

        let mut table = Vec::with_capacity(count);
        let mut previous_end = 0usize;
        for _ in 0..count {
            let tag = Tag::decode(buf);
            let end = buf.get_u32_le() as usize;
            if end < previous_end {
                return Err(ProtocolError::MalformedInput(constants::ERR_TAG_OFFSETS));
            }
            table.push((tag, end - previous_end));
            previous_end = end;
        }

        if previous_end > buf.remaining() {
            return Err(ProtocolError::MalformedInput(constants::ERR_TAG_OVERRUN));
        }

        let mut entries = BTreeMap::new();
        for (tag, len) in table {
            let value = buf.copy_to_bytes(len);
            if entries.insert(tag, value).is_some() {
                return Err(ProtocolError::DuplicateTag(tag));
            }
        }

        Ok(Self { name, entries })
    }

    /// Parse a message that must occupy all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let tag = Self::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(ProtocolError::MalformedInput(constants::ERR_TAG_TRAILING));
        }
        Ok(tag)
    }
}
