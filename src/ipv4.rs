use std::{net::Ipv4Addr, ops::Range};

use bytes::BufMut;

use crate::{checksum, ProbeError, ProbeResult};

/// Size of a IPv4 header without options, in octets.
///
/// [RFC 791 § 3.1]: https://www.rfc-editor.org/rfc/rfc791#section-3.1
pub const MIN_HEADER_LEN: usize = 20;

/// Ip Protocol
///
/// See also [Ip Protocol Numbers](https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    Unknown(u8),
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            0x01 => IpProtocol::Icmp,
            0x06 => IpProtocol::Tcp,
            0x11 => IpProtocol::Udp,
            other => IpProtocol::Unknown(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(value: IpProtocol) -> Self {
        match value {
            IpProtocol::Icmp => 0x01,
            IpProtocol::Tcp => 0x06,
            IpProtocol::Udp => 0x11,
            IpProtocol::Unknown(other) => other,
        }
    }
}

/// A view over an IPv4 packet header.
///
/// The IPv4 packet header consists of 14 fields, of which 13 are required. The 14th field is
/// optional and aptly named: options. The fields in the header are packed with the most significant
/// byte first (network byte order).
///
/// Only the fixed 20-byte part of the header is checked by [`Ipv4Packet::new_checked`]; options
/// and the payload offset depend on the IHL field, see [`Ipv4Packet::header_len`].
///
/// See also [Internet Protocol version 4](https://en.wikipedia.org/wiki/Internet_Protocol_version_4#Header)
#[derive(Debug, Clone)]
pub struct Ipv4Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Ipv4Packet<T> {
    const VER_IHL: usize = 0;
    const LENGTH: Range<usize> = 2..4;
    const TTL: usize = 8;
    const PROTOCOL: usize = 9;
    const CHECKSUM: Range<usize> = 10..12;
    const SRC_ADDR: Range<usize> = 12..16;
    const DST_ADDR: Range<usize> = 16..MIN_HEADER_LEN;

    pub fn new_checked(buffer: T) -> ProbeResult<Self> {
        let packet = Self { buffer };
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no fixed-header accessor will panic if called.
    /// Returns `Err(BufferTooShort)` if the buffer is too short.
    pub fn check_len(&self) -> ProbeResult<()> {
        if self.buffer.as_ref().len() < MIN_HEADER_LEN {
            Err(ProbeError::BufferTooShort)
        } else {
            Ok(())
        }
    }

    /// Return the header length (IHL), in octets.
    ///
    /// The IHL field has 4 bits that specify the number of 32-bit words in the header. The
    /// minimum legal value is 5 (20 bytes), the maximum is 15 (60 bytes). Values below 5 are
    /// returned as-is; callers decide whether to reject them.
    #[inline]
    pub fn header_len(&self) -> usize {
        (self.buffer.as_ref()[Self::VER_IHL] & 0x0f) as usize * 4
    }

    /// Return the time to live field.
    #[inline]
    pub fn ttl(&self) -> u8 {
        self.buffer.as_ref()[Self::TTL]
    }

    /// Return the next_header (protocol) field.
    #[inline]
    pub fn protocol(&self) -> IpProtocol {
        self.buffer.as_ref()[Self::PROTOCOL].into()
    }

    /// Return the source address field.
    #[inline]
    pub fn source_ip_address(&self) -> Ipv4Addr {
        let mut octets = [0; 4];
        octets.copy_from_slice(&self.buffer.as_ref()[Self::SRC_ADDR]);
        octets.into()
    }

    /// Bytes following the header, or `None` when the buffer ends before the IHL says the
    /// header does.
    pub fn payload(&self) -> Option<&[u8]> {
        self.buffer.as_ref().get(self.header_len()..)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Ipv4Packet<T> {
    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[Self::VER_IHL] = (data[Self::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: usize) {
        let data = self.buffer.as_mut();
        data[Self::VER_IHL] = (data[Self::VER_IHL] & !0x0f) | ((value / 4) as u8 & 0x0f);
    }

    /// Set the total packet length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        (&mut self.buffer.as_mut()[Self::LENGTH]).put_u16(value)
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_ttl(&mut self, value: u8) {
        self.buffer.as_mut()[Self::TTL] = value
    }

    /// Set the next_header (protocol) field.
    #[inline]
    pub fn set_protocol(&mut self, value: IpProtocol) {
        self.buffer.as_mut()[Self::PROTOCOL] = value.into()
    }

    /// Set the source address field.
    #[inline]
    pub fn set_source_ip_address(&mut self, value: Ipv4Addr) {
        self.buffer.as_mut()[Self::SRC_ADDR].copy_from_slice(&value.octets())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_target_ip_address(&mut self, value: Ipv4Addr) {
        self.buffer.as_mut()[Self::DST_ADDR].copy_from_slice(&value.octets())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        (&mut self.buffer.as_mut()[Self::CHECKSUM]).put_u16(0);
        let header_len = self.header_len().min(self.buffer.as_ref().len());
        let checksum = checksum::checksum16(&self.buffer.as_ref()[..header_len]);
        (&mut self.buffer.as_mut()[Self::CHECKSUM]).put_u16(checksum)
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Ipv4Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}
