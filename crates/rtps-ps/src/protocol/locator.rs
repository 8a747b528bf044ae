// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport addresses (Locator_t) and ordered locator lists.

use super::cdr::{CdrReader, CdrWriter};
use super::{CodecError, CodecResult};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Locator kind as carried on the wire (i32).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub enum LocatorKind {
    #[default]
    Invalid,
    Reserved,
    UdpV4,
    UdpV6,
}

impl LocatorKind {
    pub fn to_wire(self) -> i32 {
        match self {
            LocatorKind::Invalid => -1,
            LocatorKind::Reserved => 0,
            LocatorKind::UdpV4 => 1,
            LocatorKind::UdpV6 => 2,
        }
    }

    pub fn from_wire(value: i32) -> Self {
        match value {
            0 => LocatorKind::Reserved,
            1 => LocatorKind::UdpV4,
            2 => LocatorKind::UdpV6,
            _ => LocatorKind::Invalid,
        }
    }
}

/// Transport address: kind, port and 16-byte address.
///
/// IPv4 addresses occupy the last four address bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub struct Locator {
    pub kind: LocatorKind,
    pub port: u32,
    pub address: [u8; 16],
}

impl Locator {
    pub const WIRE_SIZE: usize = 24;

    pub const INVALID: Locator = Locator {
        kind: LocatorKind::Invalid,
        port: 0,
        address: [0; 16],
    };

    pub fn udpv4(ip: Ipv4Addr, port: u32) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&ip.octets());
        Self {
            kind: LocatorKind::UdpV4,
            port,
            address,
        }
    }

    pub fn udpv6(ip: Ipv6Addr, port: u32) -> Self {
        Self {
            kind: LocatorKind::UdpV6,
            port,
            address: ip.octets(),
        }
    }

    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(ip) => Self::udpv4(ip, u32::from(addr.port())),
            IpAddr::V6(ip) => Self::udpv6(ip, u32::from(addr.port())),
        }
    }

    /// Socket address for UDP kinds; `None` for other kinds or ports.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LocatorKind::UdpV4 => Some(SocketAddr::new(IpAddr::V4(self.ipv4()), port)),
            LocatorKind::UdpV6 => Some(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::from(self.address)),
                port,
            )),
            _ => None,
        }
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.address[12],
            self.address[13],
            self.address[14],
            self.address[15],
        )
    }

    /// A locator is valid when its kind is set and the port fits UDP.
    pub fn is_valid(&self) -> bool {
        self.kind != LocatorKind::Invalid && self.port <= u32::from(u16::MAX)
    }

    pub fn is_multicast(&self) -> bool {
        match self.kind {
            LocatorKind::UdpV4 => self.ipv4().is_multicast(),
            LocatorKind::UdpV6 => self.address[0] == 0xff,
            _ => false,
        }
    }

    /// Address bytes all zero (port-only locator).
    pub fn is_address_defined(&self) -> bool {
        self.address.iter().any(|&b| b != 0)
    }

    pub fn encode(&self, w: &mut CdrWriter) {
        w.write_i32(self.kind.to_wire());
        w.write_u32(self.port);
        w.write_bytes(&self.address);
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        let kind = LocatorKind::from_wire(r.read_i32()?);
        let port = r.read_u32()?;
        let address = r.read_array::<16>()?;
        Ok(Self {
            kind,
            port,
            address,
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::UdpV4 => write!(f, "udpv4://{}:{}", self.ipv4(), self.port),
            LocatorKind::UdpV6 => write!(
                f,
                "udpv6://[{}]:{}",
                Ipv6Addr::from(self.address),
                self.port
            ),
            LocatorKind::Reserved => write!(f, "reserved:{}", self.port),
            LocatorKind::Invalid => write!(f, "invalid"),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}

/// Ordered list of locators without duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub struct LocatorList(Vec<Locator>);

impl LocatorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append unless already present.
    pub fn push(&mut self, locator: Locator) {
        if !self.0.contains(&locator) {
            self.0.push(locator);
        }
    }

    pub fn extend(&mut self, other: &LocatorList) {
        for loc in other.iter() {
            self.push(*loc);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Locator> {
        self.0.iter()
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.0.contains(locator)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// True when every locator is valid (the empty list is valid).
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(Locator::is_valid)
    }

    /// First invalid locator, for error reporting.
    pub fn first_invalid(&self) -> Option<&Locator> {
        self.0.iter().find(|l| !l.is_valid())
    }
}

impl From<Vec<Locator>> for LocatorList {
    fn from(v: Vec<Locator>) -> Self {
        let mut list = LocatorList::new();
        for loc in v {
            list.push(loc);
        }
        list
    }
}

impl<'a> IntoIterator for &'a LocatorList {
    type Item = &'a Locator;
    type IntoIter = std::slice::Iter<'a, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Locator> for LocatorList {
    fn from_iter<I: IntoIterator<Item = Locator>>(iter: I) -> Self {
        let mut list = LocatorList::new();
        for loc in iter {
            list.push(loc);
        }
        list
    }
}

/// Decode a locator stored as a parameter value (exactly 24 bytes).
pub(crate) fn decode_locator_value(pid: u16, value: &[u8], r: &CdrReader<'_>) -> CodecResult<Locator> {
    if value.len() < Locator::WIRE_SIZE {
        return Err(CodecError::InvalidParameter {
            pid,
            reason: "locator shorter than 24 bytes",
        });
    }
    let mut sub = CdrReader::new(value, r.endianness());
    Locator::decode(&mut sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cdr::Endianness;

    #[test]
    fn test_locator_udpv4_layout() {
        let loc = Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7400);
        let mut w = CdrWriter::new(Endianness::Little);
        loc.encode(&mut w);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), Locator::WIRE_SIZE);
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7400u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &[239, 255, 0, 1]);
        assert!(loc.is_multicast());
    }

    #[test]
    fn test_locator_validity() {
        assert!(Locator::udpv4(Ipv4Addr::LOCALHOST, 7411).is_valid());
        let mut bad = Locator::udpv4(Ipv4Addr::LOCALHOST, 70000);
        assert!(!bad.is_valid());
        bad.port = 1;
        bad.kind = LocatorKind::Invalid;
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_locator_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:7411".parse().expect("Valid address");
        let loc = Locator::from_socket_addr(&addr);
        assert_eq!(loc.to_socket_addr(), Some(addr));
        assert_eq!(loc.to_string(), "udpv4://127.0.0.1:7411");
    }

    #[test]
    fn test_locator_list_dedup() {
        let a = Locator::udpv4(Ipv4Addr::LOCALHOST, 1);
        let b = Locator::udpv4(Ipv4Addr::LOCALHOST, 2);
        let list: LocatorList = vec![a, b, a].into();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&b));
        assert!(list.is_valid());
    }
}
