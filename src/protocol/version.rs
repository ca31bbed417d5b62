//! # Protocol Versions
//!
//! Version tags are four opaque bytes on the wire (`Q036`, ...). The supported
//! list is a compile-time table, most preferred first.

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A four byte protocol version tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version([u8; 4]);

impl Version {
    pub const Q036: Version = Version(*b"Q036");
    pub const Q035: Version = Version(*b"Q035");
    pub const Q034: Version = Version(*b"Q034");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }

    /// Read one version tag.
    ///
    /// # Errors
    /// Returns `ProtocolError::MalformedInput` if fewer than 4 bytes remain
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::MalformedInput(constants::ERR_SHORT_VERSION));
        }
        let mut bytes = [0u8; 4];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl From<[u8; 4]> for Version {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

// Text rendering is for logs only; the codec never interprets the bytes.
impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(u8::is_ascii_graphic) {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08x}", u32::from_be_bytes(self.0))
        }
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

/// Versions this implementation speaks, highest preference first.
pub const SUPPORTED_VERSIONS: [Version; 3] = [Version::Q036, Version::Q035, Version::Q034];

/// The preferred version.
pub fn get_version() -> Version {
    SUPPORTED_VERSIONS[0]
}

/// All supported versions, highest preference first.
pub fn get_versions() -> &'static [Version] {
    &SUPPORTED_VERSIONS
}

pub fn is_supported_version(version: Version) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_version_is_supported() {
        assert_eq!(get_version(), get_versions()[0]);
        assert!(is_supported_version(get_versions()[0]));
        assert!(get_versions().iter().all(|v| is_supported_version(*v)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert!(!is_supported_version(Version::new(*b"Q099")));
        assert!(!is_supported_version(Version::new([0x0a, 0x0a, 0x0a, 0x0a])));
    }

    #[test]
    fn test_decode_short_buffer() {
        let mut buf: &[u8] = b"Q03";
        assert!(matches!(
            Version::decode(&mut buf),
            Err(ProtocolError::MalformedInput(constants::ERR_SHORT_VERSION))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::Q036.to_string(), "Q036");
        assert_eq!(Version::new([0, 0, 0, 1]).to_string(), "0x00000001");
    }
}
