//! Fixed-width 8 byte connection identifiers.

use crate::config::CONNECTION_ID_LEN;
use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes};
use rand::RngCore;
use std::fmt;

/// Opaque identifier scoping a connection. Serialized as raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectionId([u8; CONNECTION_ID_LEN]);

impl ConnectionId {
    pub const fn new(bytes: [u8; CONNECTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh identifier from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; CONNECTION_ID_LEN] {
        &self.0
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }

    /// Read a connection ID from the front of `buf`.
    ///
    /// # Errors
    /// Returns `ProtocolError::MalformedInput` if fewer than 8 bytes remain
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < CONNECTION_ID_LEN {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_CONNECTION_ID,
            ));
        }
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        Self::decode(&mut buf)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }
}

impl From<[u8; CONNECTION_ID_LEN]> for ConnectionId {
    fn from(bytes: [u8; CONNECTION_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({self})")
    }
}
