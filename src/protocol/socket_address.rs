//! Socket addresses as carried in the `CADR` entry of a public reset.
//!
//! ```text
//! [Family(2, LE)] [Address(4 | 16)] [Port(2, LE)]
//! ```

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

/// Family code for IPv4 addresses.
pub const FAMILY_IPV4: u16 = 0x0002;
/// Family code for IPv6 addresses.
pub const FAMILY_IPV6: u16 = 0x000a;

/// An IP address and port.
///
/// IPv6 flow info and scope ID are not part of the wire format and are
/// cleared on construction, so equality covers family, address and port only.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddress(SocketAddr);

impl SocketAddress {
    pub fn new(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => Self(addr),
            SocketAddr::V6(v6) => Self(SocketAddr::V6(SocketAddrV6::new(
                *v6.ip(),
                v6.port(),
                0,
                0,
            ))),
        }
    }

    pub fn family(&self) -> u16 {
        match self.0 {
            SocketAddr::V4(_) => FAMILY_IPV4,
            SocketAddr::V6(_) => FAMILY_IPV6,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn encoded_len(&self) -> usize {
        match self.0 {
            SocketAddr::V4(_) => 2 + 4 + 2,
            SocketAddr::V6(_) => 2 + 16 + 2,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16_le(self.family());
        match self.0.ip() {
            IpAddr::V4(ip) => buf.put_slice(&ip.octets()),
            IpAddr::V6(ip) => buf.put_slice(&ip.octets()),
        }
        buf.put_u16_le(self.0.port());
    }

    /// Read an address from the front of `buf`.
    ///
    /// # Errors
    /// - `UnknownAddressFamily` for family codes other than IPv4 / IPv6
    /// - `MalformedInput` on truncation
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_SOCKET_ADDRESS,
            ));
        }
        let family = buf.get_u16_le();
        let ip = match family {
            FAMILY_IPV4 => {
                let mut octets = [0u8; 4];
                read_exact(buf, &mut octets)?;
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            FAMILY_IPV6 => {
                let mut octets = [0u8; 16];
                read_exact(buf, &mut octets)?;
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => return Err(ProtocolError::UnknownAddressFamily(other)),
        };
        if buf.remaining() < 2 {
            return Err(ProtocolError::MalformedInput(
                constants::ERR_SHORT_SOCKET_ADDRESS,
            ));
        }
        let port = buf.get_u16_le();
        Ok(Self::new(SocketAddr::new(ip, port)))
    }

    /// Parse an address that must occupy all of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let addr = Self::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(ProtocolError::MalformedInput(constants::ERR_ADDRESS_LENGTH));
        }
        Ok(addr)
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn read_exact<B: Buf>(buf: &mut B, out: &mut [u8]) -> Result<()> {
    if buf.remaining() < out.len() {
        return Err(ProtocolError::MalformedInput(
            constants::ERR_SHORT_SOCKET_ADDRESS,
        ));
    }
    buf.copy_to_slice(out);
    Ok(())
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl From<SocketAddress> for SocketAddr {
    fn from(addr: SocketAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SocketAddress({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_wire_bytes() {
        let addr = SocketAddress::new("4.31.198.44:443".parse().unwrap());
        assert_eq!(
            addr.to_bytes().as_ref(),
            &[0x02, 0x00, 0x04, 0x1F, 0xC6, 0x2C, 0xBB, 0x01]
        );
        assert_eq!(SocketAddress::from_slice(&addr.to_bytes()).unwrap(), addr);
    }

    #[test]
    fn test_ipv6_roundtrip() {
        let addr = SocketAddress::new("[2001:db8::1]:8443".parse().unwrap());
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..2], &[0x0a, 0x00]);
        assert_eq!(SocketAddress::from_slice(&bytes).unwrap(), addr);
    }

    #[test]
    fn test_ipv6_scope_is_dropped() {
        let with_scope = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 80, 7, 3));
        let plain = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 80, 0, 0));
        assert_eq!(SocketAddress::new(with_scope), SocketAddress::new(plain));
    }

    #[test]
    fn test_unknown_family() {
        assert!(matches!(
            SocketAddress::from_slice(&[0x07, 0x00, 1, 2, 3, 4, 0, 0]),
            Err(ProtocolError::UnknownAddressFamily(0x0007))
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = [0x02, 0x00, 0x04, 0x1F, 0xC6, 0x2C, 0xBB, 0x01];
        for cut in 0..bytes.len() {
            assert!(
                matches!(
                    SocketAddress::from_slice(&bytes[..cut]),
                    Err(ProtocolError::MalformedInput(_))
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = [0x02, 0x00, 0x04, 0x1F, 0xC6, 0x2C, 0xBB, 0x01, 0x00];
        assert!(matches!(
            SocketAddress::from_slice(&bytes),
            Err(ProtocolError::MalformedInput(constants::ERR_ADDRESS_LENGTH))
        ));
    }
}
