use std::ops::Range;

use bytes::{Buf, BufMut};

use crate::{ProbeError, ProbeResult};

/// Length of an Ethernet II header: two addresses and the EtherType.
pub const HEADER_LEN: usize = 14;

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    /// The broadcast address.
    pub const BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> EthernetAddress {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        EthernetAddress(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let bytes = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }
}

/// EtherType is a two-octet field in an Ethernet frame. It is used to indicate which protocol is
/// encapsulated in the payload of the frame.
///
/// A capture socket sees every protocol on the wire, so values this crate does not care about
/// are kept as [`EtherType::Unknown`] instead of being rejected at parse time.
///
/// See also [EtherType](https://en.wikipedia.org/wiki/EtherType)
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            0x86dd => EtherType::Ipv6,
            other => EtherType::Unknown(other),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(value: EtherType) -> Self {
        match value {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Ipv6 => 0x86dd,
            EtherType::Unknown(other) => other,
        }
    }
}

/// A read/write view over an Ethernet II frame.
///
/// Each frame starts with an Ethernet header, which contains destination and source MAC addresses
/// as its first two fields followed by the EtherType. The rest of the frame is the payload, for
/// example an IPv4 packet.
///
/// See also [EthernetFrame](https://en.wikipedia.org/wiki/Ethernet_frame)
#[derive(Debug, Clone)]
pub struct EthernetFrame<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> EthernetFrame<T> {
    const DESTINATION: Range<usize> = 0..6;
    const SOURCE: Range<usize> = 6..12;
    const ETHERTYPE: Range<usize> = 12..HEADER_LEN;

    /// Wrap a buffer, checking that it holds at least an Ethernet header.
    pub fn new_checked(buffer: T) -> ProbeResult<Self> {
        let frame = Self { buffer };
        frame.check_len()?;
        Ok(frame)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(BufferTooShort)` if the buffer is too short.
    pub fn check_len(&self) -> ProbeResult<()> {
        if self.buffer.as_ref().len() < HEADER_LEN {
            Err(ProbeError::BufferTooShort)
        } else {
            Ok(())
        }
    }

    /// Destination MAC address
    pub fn target_mac_address(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.buffer.as_ref()[Self::DESTINATION])
    }

    /// Source MAC address
    pub fn source_mac_address(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.buffer.as_ref()[Self::SOURCE])
    }

    pub fn ether_type(&self) -> EtherType {
        (&self.buffer.as_ref()[Self::ETHERTYPE]).get_u16().into()
    }

    /// Everything after the Ethernet header.
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[HEADER_LEN..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EthernetFrame<T> {
    pub fn set_target_mac_address(&mut self, value: EthernetAddress) {
        self.buffer.as_mut()[Self::DESTINATION].copy_from_slice(value.as_bytes())
    }

    pub fn set_source_mac_address(&mut self, value: EthernetAddress) {
        self.buffer.as_mut()[Self::SOURCE].copy_from_slice(value.as_bytes())
    }

    pub fn set_ether_type(&mut self, value: EtherType) {
        (&mut self.buffer.as_mut()[Self::ETHERTYPE]).put_u16(value.into())
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[HEADER_LEN..]
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for EthernetFrame<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}
