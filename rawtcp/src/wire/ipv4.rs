use core::fmt;
#[cfg(feature = "std")]
use core::str::FromStr;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::field::Field;

/// Length of the fixed IPv4 header emitted by this crate, in octets.
///
/// All self-generated traffic carries no IP options, so the header is always
/// exactly five 32-bit words long.
pub const BASE_HEADER_LEN: usize = 20;

enum_with_unknown! {
    /// The protocol carried in the IP payload.
    pub enum Protocol(u8) {
        /// Transmission Control Protocol.
        Tcp = 6,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Unknown(id) => write!(f, "proto {}", id),
        }
    }
}

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Decode a network endian `u32` into an address.
    pub fn from_network_integer(num: u32) -> Self {
        Address(num.to_be_bytes())
    }
}

#[cfg(feature = "std")]
impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

#[cfg(feature = "std")]
impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

#[cfg(feature = "std")]
impl FromStr for Address {
    type Err = ::std::net::AddrParseError;

    fn from_str(src: &str) -> core::result::Result<Self, Self::Err> {
        src.parse::<::std::net::Ipv4Addr>().map(Into::into)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// One end of a TCP connection: an IPv4 address and a port.
///
/// Immutable once a session starts.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct Endpoint {
    /// The IPv4 address.
    pub addr: Address,
    /// The TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Construct an endpoint from an address and a port.
    pub const fn new(addr: Address, port: u16) -> Endpoint {
        Endpoint { addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const TOS:      usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the packet as a mutable raw byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is too short and
    /// `Err(Error::Malformed)` if the header length is greater than the
    /// total length.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::DST_ADDR.end {
            Err(Error::Truncated)
        } else if len < self.header_len() as usize {
            Err(Error::Truncated)
        } else if self.header_len() as u16 > self.total_len() {
            Err(Error::Malformed)
        } else if len < self.total_len() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length (`IHL * 4`), in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the type-of-service field.
    #[inline]
    pub fn tos(&self) -> u8 {
        self.0[field::TOS]
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    /// Return the fragment offset, in octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) << 3
    }

    /// Return the time to live field.
    #[inline]
    pub fn ttl(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        super::checksum::data(&self.0[..self.header_len() as usize]) == !0
    }

    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0x0f) | ((value / 4) & 0x0f);
    }

    /// Set the type-of-service field.
    #[inline]
    pub fn set_tos(&mut self, value: u8) {
        self.0[field::TOS] = value;
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Set the fragment offset, in octets.
    #[inline]
    pub fn set_frag_offset(&mut self, value: u16) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = (raw & 0xe000) | (value >> 3);
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_ttl(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    ///
    /// The sum is taken over the header with the checksum field zeroed, then
    /// the complement is written back.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = {
            !super::checksum::data(&self.0[..self.header_len() as usize])
        };
        self.set_checksum(checksum)
    }

    /// Compute the range of the payload without accessing it.
    pub fn payload_range(&self) -> Field {
        let header_end = usize::from(self.header_len());
        let total_len = usize::from(self.total_len());
        header_end..total_len
    }

    /// Return the payload as a byte slice.
    pub fn payload_slice(&self) -> &[u8] {
        let range = self.payload_range();
        &self.0[range]
    }

    /// Return the payload as a mutable byte slice.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let range = self.payload_range();
        &mut self.0[range]
    }
}

impl AsRef<[u8]> for ipv4 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for ipv4 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// A high-level representation of an IPv4 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source of the packet.
    pub src_addr: Address,
    /// The destination of the packet.
    pub dst_addr: Address,
    /// The encapsulated protocol identifier.
    pub protocol: Protocol,
    /// The length of everything following the IP header.
    pub payload_len: usize,
    /// The fragment identification, chosen fresh per datagram.
    pub ident: u16,
    /// The remaining hop limit of the packet.
    pub ttl: u8,
}

impl Repr {
    /// Parse an IPv4 packet header and return a high-level representation.
    ///
    /// Deliberately permissive: neither the version field nor the header
    /// checksum is validated, matching the traffic model of this crate where
    /// all parsed datagrams are either self-generated or come from a
    /// cooperating peer. Length consistency *is* enforced.
    pub fn parse(packet: &ipv4) -> Result<Repr> {
        packet.check_len()?;
        Ok(Repr {
            src_addr:    packet.src_addr(),
            dst_addr:    packet.dst_addr(),
            protocol:    packet.protocol(),
            payload_len: packet.payload_range().len(),
            ident:       packet.ident(),
            ttl:         packet.ttl(),
        })
    }

    /// Return the length of a header emitted from this representation.
    pub fn buffer_len(&self) -> usize {
        BASE_HEADER_LEN
    }

    /// Return the value for the total length field.
    pub fn total_len(&self) -> usize {
        BASE_HEADER_LEN + self.payload_len
    }

    /// Emit this representation into an IPv4 packet header.
    ///
    /// The checksum field is left zero; finalization fills it in once the
    /// whole datagram is assembled.
    pub fn emit(&self, packet: &mut ipv4) {
        packet.set_version(4);
        packet.set_header_len(BASE_HEADER_LEN as u8);
        packet.set_tos(0);
        packet.set_total_len(self.total_len() as u16);
        packet.set_ident(self.ident);
        packet.set_frag_offset(0);
        packet.set_ttl(self.ttl);
        packet.set_protocol(self.protocol);
        packet.set_checksum(0);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} len={}",
               self.src_addr, self.dst_addr, self.protocol, self.payload_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static HEADER_BYTES: [u8; 20] =
        [0x45, 0x00, 0x00, 0x3c,
         0xbe, 0xef, 0x00, 0x00,
         0xff, 0x06, 0x00, 0x00,
         0x0a, 0x00, 0x00, 0x01,
         0x0a, 0x00, 0x00, 0x02];

    #[test]
    fn deconstruct() {
        let mut buffer = [0u8; 60];
        buffer[..20].copy_from_slice(&HEADER_BYTES);
        let packet = ipv4::new_checked(&buffer[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 60);
        assert_eq!(packet.ident(), 0xbeef);
        assert_eq!(packet.ttl(), 255);
        assert_eq!(packet.protocol(), Protocol::Tcp);
        assert_eq!(packet.src_addr(), Address::new(10, 0, 0, 1));
        assert_eq!(packet.dst_addr(), Address::new(10, 0, 0, 2));
        assert_eq!(packet.payload_range(), 20..60);
    }

    #[test]
    fn emit_and_parse_back() {
        let repr = Repr {
            src_addr:    Address::new(192, 168, 2, 109),
            dst_addr:    Address::new(192, 168, 2, 100),
            protocol:    Protocol::Tcp,
            payload_len: 40,
            ident:       0x1234,
            ttl:         255,
        };
        let mut buffer = [0u8; 60];
        repr.emit(ipv4::new_unchecked_mut(&mut buffer));

        let packet = ipv4::new_checked(&buffer[..]).unwrap();
        let parsed = Repr::parse(packet).unwrap();
        assert_eq!(parsed, repr);
        assert_eq!(packet.total_len(), 60);
    }

    #[test]
    fn checksum_round_trip() {
        let repr = Repr {
            src_addr:    Address::new(10, 0, 0, 1),
            dst_addr:    Address::new(10, 0, 0, 2),
            protocol:    Protocol::Tcp,
            payload_len: 0,
            ident:       0,
            ttl:         255,
        };
        let mut buffer = [0u8; 20];
        repr.emit(ipv4::new_unchecked_mut(&mut buffer));
        let packet = ipv4::new_unchecked_mut(&mut buffer);
        packet.fill_checksum();
        assert!(packet.checksum() != 0);
        assert!(packet.verify_checksum());
    }

    #[test]
    fn truncated() {
        assert_eq!(ipv4::new_checked(&HEADER_BYTES[..16]).err(),
                   Some(Error::Truncated));
    }

    #[test]
    fn header_longer_than_total() {
        let mut buffer = [0u8; 64];
        buffer[..20].copy_from_slice(&HEADER_BYTES);
        // IHL of 15 words against a total length of 40.
        buffer[0] = 0x4f;
        buffer[3] = 40;
        let packet = ipv4::new_unchecked(&buffer[..]);
        assert_eq!(packet.check_len(), Err(Error::Malformed));
    }
}
