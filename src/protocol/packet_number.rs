//! # Packet Numbers
//!
//! Two encodings coexist:
//! - **Full width**: 8 bytes little-endian, used wherever a packet number is an
//!   opaque value inside a tag-value message (the `RSEQ` entry of a reset).
//! - **Truncated**: the low 1, 2, 4 or 6 bytes (little-endian) carried in a
//!   regular packet header. Decoding picks the candidate closest to the
//!   previously observed packet number, which callers pass in explicitly.

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes};
use std::cmp::Reverse;
use std::fmt;

/// Byte width of a truncated packet number in a regular packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketNumberLen {
    One,
    Two,
    Four,
    Six,
}

impl PacketNumberLen {
    /// Number of bytes on the wire.
    pub const fn bytes(self) -> usize {
        match self {
            PacketNumberLen::One => 1,
            PacketNumberLen::Two => 2,
            PacketNumberLen::Four => 4,
            PacketNumberLen::Six => 6,
        }
    }

    /// Map a byte count onto a width class.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidValue` for anything but 1, 2, 4 or 6
    pub fn from_bytes(bytes: usize) -> Result<Self> {
        match bytes {
            1 => Ok(PacketNumberLen::One),
            2 => Ok(PacketNumberLen::Two),
            4 => Ok(PacketNumberLen::Four),
            6 => Ok(PacketNumberLen::Six),
            _ => Err(ProtocolError::InvalidValue(
                constants::ERR_PACKET_NUMBER_WIDTH,
            )),
        }
    }

    /// Decode the two width bits of the public flags (already shifted down).
    pub const fn from_flag_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => PacketNumberLen::One,
            0b01 => PacketNumberLen::Two,
            0b10 => PacketNumberLen::Four,
            _ => PacketNumberLen::Six,
        }
    }

    /// The two width bits for the public flags (not yet shifted into place).
    pub const fn flag_bits(self) -> u8 {
        match self {
            PacketNumberLen::One => 0b00,
            PacketNumberLen::Two => 0b01,
            PacketNumberLen::Four => 0b10,
            PacketNumberLen::Six => 0b11,
        }
    }

    /// Smallest width that holds `value` without truncation. For values up to
    /// [`PacketNumber::MAX_WIRE`], decoding against a previous packet number of
    /// zero restores it exactly; anything larger maps to `Six` and cannot be
    /// encoded into a packet header.
    pub fn for_value(value: PacketNumber) -> Self {
        match value.0 {
            0..=0xff => PacketNumberLen::One,
            0x100..=0xffff => PacketNumberLen::Two,
            0x1_0000..=0xffff_ffff => PacketNumberLen::Four,
            _ => PacketNumberLen::Six,
        }
    }

    /// Smallest width whose window covers more than twice the distance
    /// between `packet_number` and the largest acknowledged packet.
    pub fn for_packet(packet_number: PacketNumber, largest_acked: PacketNumber) -> Self {
        let unacked = packet_number.0.saturating_sub(largest_acked.0).max(1);
        let needed = u128::from(unacked) * 2;
        [
            PacketNumberLen::One,
            PacketNumberLen::Two,
            PacketNumberLen::Four,
        ]
        .into_iter()
        .find(|len| needed < len.window())
        .unwrap_or(PacketNumberLen::Six)
    }

    fn window(self) -> u128 {
        1u128 << (self.bytes() * 8)
    }
}

/// A packet number. Equality compares the logical value, never the encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PacketNumber(u64);

impl PacketNumber {
    /// Width of the full encoding.
    pub const FULL_LEN: usize = 8;

    /// Largest value a packet header can carry (six bytes).
    pub const MAX_WIRE: u64 = 0xffff_ffff_ffff;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Write the full-width 8 byte little-endian form.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.0);
    }

    /// Read the full-width 8 byte little-endian form.
    ///
    /// # Errors
    /// Returns `ProtocolError::MalformedInput` if fewer than 8 bytes remain
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < Self::FULL_LEN {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_PACKET_NUMBER,
            ));
        }
        Ok(Self(buf.get_u64_le()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        Self::decode(&mut buf)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0.to_le_bytes())
    }

    /// Write the low `len` bytes, little-endian.
    pub fn encode_truncated<B: BufMut>(&self, len: PacketNumberLen, buf: &mut B) {
        buf.put_uint_le(self.0, len.bytes());
    }

    /// Read a truncated packet number and reconstruct the full value closest
    /// to `previous`.
    ///
    /// # Errors
    /// Returns `ProtocolError::MalformedInput` if fewer than `len` bytes remain
    pub fn decode_truncated<B: Buf>(
        buf: &mut B,
        len: PacketNumberLen,
        previous: PacketNumber,
    ) -> Result<Self> {
        if buf.remaining() < len.bytes() {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_PACKET_NUMBER,
            ));
        }
        let truncated = buf.get_uint_le(len.bytes());
        Ok(Self::reconstruct(truncated, len, previous))
    }

    /// Closest-value reconstruction: among the values whose low bytes equal
    /// `truncated`, pick the one nearest `previous`. Ties go to the larger one.
    pub fn reconstruct(truncated: u64, len: PacketNumberLen, previous: PacketNumber) -> Self {
        let window = len.window();
        let mask = window - 1;
        let reference = u128::from(previous.0);
        let base = (reference & !mask) | (u128::from(truncated) & mask);

        let best = [base.checked_sub(window), Some(base), Some(base + window)]
            .into_iter()
            .flatten()
            .filter(|candidate| *candidate <= u128::from(u64::MAX))
            .min_by_key(|candidate| (candidate.abs_diff(reference), Reverse(*candidate)))
            .unwrap_or(base);

        // `best` is bounded by the filter above; `base` never exceeds u64::MAX
        Self(best as u64)
    }

    /// Next packet number, or `None` on overflow.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u64> for PacketNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PacketNumber> for u64 {
    fn from(value: PacketNumber) -> Self {
        value.0
    }
}

impl TryFrom<i64> for PacketNumber {
    type Error = ProtocolError;

    fn try_from(value: i64) -> Result<Self> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidValue(constants::ERR_NEGATIVE_PACKET_NUMBER))
    }
}

impl TryFrom<i128> for PacketNumber {
    type Error = ProtocolError;

    fn try_from(value: i128) -> Result<Self> {
        if value < 0 {
            return Err(ProtocolError::InvalidValue(
                constants::ERR_NEGATIVE_PACKET_NUMBER,
            ));
        }
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidValue(constants::ERR_PACKET_NUMBER_OVERFLOW))
    }
}

impl fmt::Display for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketNumber({})", self.0)
    }
}
