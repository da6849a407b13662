/*! Intent-driven datagram assembly and decomposition.

A datagram is built for one of six *intents*. The intent decides which TCP
flags are set, whether the options area carries anything meaningful and
where the sequence and acknowledgment numbers come from:

| intent  | flags set     | seq/ack source  | payload        | options          |
|---------|---------------|-----------------|----------------|------------------|
| `Urg`   | none          | fresh defaults  | none           | padding          |
| `Ack`   | ack           | caller prefix   | none           | padding          |
| `Psh`   | psh, ack      | caller prefix   | after prefix   | padding          |
| `Rst`   | none          | fresh defaults  | none           | padding          |
| `Syn`   | syn           | fresh defaults  | none           | mss, sack-perm   |
| `Fin`   | ack, fin      | caller prefix   | none           | padding          |

The *caller prefix* convention: the data buffer handed to [`Builder::build`]
starts with the sequence number (4 octets) and the acknowledgment number
(4 octets), both in network order, followed by the application payload. The
prefix is stripped and never appears on the wire. *Fresh defaults* means a
random sequence number and a zero acknowledgment number.

[`Builder::build`]: struct.Builder.html
*/

use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use crate::isn;
use crate::wire::{
    ipv4_packet, tcp_segment,
    Endpoint, Error, IpProtocol, Ipv4Repr, Result, TcpFlags, TcpRepr,
    DEFAULT_MSS, DEFAULT_WINDOW, IPV4_HEADER_LEN};

/// Capacity of a datagram buffer, in octets.
pub const DATAGRAM_LEN: usize = 4096;

/// Length of the seq/ack prefix expected at the start of a data buffer.
pub const SEQ_ACK_PREFIX_LEN: usize = 8;

/// Time-to-live of every emitted datagram.
pub const DEFAULT_TTL: u8 = 255;

const SEQ_OFFSET: usize = IPV4_HEADER_LEN + 4;
const ACK_OFFSET: usize = IPV4_HEADER_LEN + 8;
const DST_PORT_OFFSET: usize = IPV4_HEADER_LEN + 2;

/// The packet type discriminator driving datagram assembly.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Intent {
    /// An urgent probe. Flags are left clear.
    Urg,
    /// A bare acknowledgment.
    Ack,
    /// A data push, acknowledged.
    Psh,
    /// A reset. Flags are left clear.
    Rst,
    /// A connection request.
    Syn,
    /// A teardown notice, acknowledged.
    Fin,
}

impl Intent {
    fn flags(self) -> TcpFlags {
        let mut flags = TcpFlags::default();
        match self {
            Intent::Urg | Intent::Rst => (),
            Intent::Ack => flags.set_ack(true),
            Intent::Psh => {
                flags.set_psh(true);
                flags.set_ack(true);
            }
            Intent::Syn => flags.set_syn(true),
            Intent::Fin => {
                flags.set_ack(true);
                flags.set_fin(true);
            }
        }
        flags
    }

    /// Whether the seq/ack pair comes from the caller's data prefix.
    fn takes_prefix(self) -> bool {
        match self {
            Intent::Ack | Intent::Psh | Intent::Fin => true,
            Intent::Urg | Intent::Rst | Intent::Syn => false,
        }
    }

    fn carries_payload(self) -> bool {
        match self {
            Intent::Psh => true,
            _ => false,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Intent::Urg => "URG",
            Intent::Ack => "ACK",
            Intent::Psh => "PSH",
            Intent::Rst => "RST",
            Intent::Syn => "SYN",
            Intent::Fin => "FIN",
        };
        write!(f, "{}", name)
    }
}

/// A finished datagram, exclusively owned by its current holder.
///
/// The buffer has a fixed capacity but only the first [`len`] octets are
/// meaningful; the transport must send exactly that many. Ownership moves
/// from builder to transport by value, never by aliasing.
///
/// [`len`]: #method.len
#[derive(Clone)]
pub struct Datagram {
    buffer: [u8; DATAGRAM_LEN],
    len: usize,
}

impl Datagram {
    /// Return the meaningful octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Return the number of meaningful octets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the datagram contains no octets at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Datagram")
            .field("len", &self.len)
            .finish()
    }
}

/// Assembles complete IP+TCP datagrams for one session.
///
/// The endpoints are fixed at construction; per-datagram variance comes from
/// the intent, the caller's data buffer and the internal generator that
/// supplies fresh sequence numbers and fragment identifications.
#[derive(Debug)]
pub struct Builder {
    src: Endpoint,
    dst: Endpoint,
    generator: isn::Generator,
}

impl Builder {
    /// Create a builder with a randomly keyed generator.
    #[cfg(feature = "std")]
    pub fn new(src: Endpoint, dst: Endpoint) -> Builder {
        Builder::with_generator(src, dst, isn::Generator::from_std_hash())
    }

    /// Create a builder with a caller-provided generator.
    pub fn with_generator(src: Endpoint, dst: Endpoint, generator: isn::Generator)
        -> Builder
    {
        Builder { src, dst, generator }
    }

    /// Compose a complete datagram for the given intent.
    ///
    /// For prefix-taking intents `data` must be at least eight octets long
    /// or `Err(Error::Truncated)` is returned; everything past the prefix is
    /// the payload for `Psh` and ignored otherwise. For the remaining
    /// intents `data` is ignored entirely. `Err(Error::Exhausted)` signals a
    /// payload that does not fit the fixed buffer capacity.
    ///
    /// Finalization runs in a fixed order: the TCP checksum is computed over
    /// the pseudo-header, TCP header, options and payload; then the IP
    /// header checksum is computed over the entire datagram with the
    /// checksum field zeroed, so the complemented sum over the assembled
    /// bytes recomputes to zero.
    pub fn build(&mut self, intent: Intent, data: &[u8]) -> Result<Datagram> {
        let (seq_number, ack_number) = if intent.takes_prefix() {
            if data.len() < SEQ_ACK_PREFIX_LEN {
                return Err(Error::Truncated);
            }
            (NetworkEndian::read_u32(&data[0..4]),
             NetworkEndian::read_u32(&data[4..8]))
        } else {
            (self.generator.next_isn(), 0)
        };

        let payload = if intent.carries_payload() {
            &data[SEQ_ACK_PREFIX_LEN..]
        } else {
            &[]
        };

        let tcp_repr = TcpRepr {
            src_port:       self.src.port,
            dst_port:       self.dst.port,
            seq_number,
            ack_number,
            flags:          intent.flags(),
            window_len:     DEFAULT_WINDOW,
            max_seg_size:   if intent == Intent::Syn { Some(DEFAULT_MSS) } else { None },
            sack_permitted: intent == Intent::Syn,
            payload_len:    payload.len(),
        };

        let ip_repr = Ipv4Repr {
            src_addr:    self.src.addr,
            dst_addr:    self.dst.addr,
            protocol:    IpProtocol::Tcp,
            payload_len: tcp_repr.buffer_len(),
            ident:       self.generator.next_ident(),
            ttl:         DEFAULT_TTL,
        };

        let total_len = ip_repr.total_len();
        if total_len > DATAGRAM_LEN {
            return Err(Error::Exhausted);
        }

        let mut datagram = Datagram {
            buffer: [0; DATAGRAM_LEN],
            len: total_len,
        };

        {
            let buffer = &mut datagram.buffer[..total_len];
            let packet = ipv4_packet::new_unchecked_mut(buffer);
            ip_repr.emit(packet);

            let segment = tcp_segment::new_unchecked_mut(packet.payload_mut_slice());
            tcp_repr.emit(segment);
            segment.payload_mut_slice().copy_from_slice(payload);
            segment.fill_checksum(ip_repr.src_addr, ip_repr.dst_addr);
        }

        // The header checksum goes over the whole datagram, checksum field
        // zeroed, TCP checksum already in place.
        let checksum = {
            let buffer = &mut datagram.buffer[..total_len];
            let packet = ipv4_packet::new_unchecked_mut(buffer);
            packet.set_checksum(0);
            !crate::wire::checksum::data(packet.as_bytes())
        };
        ipv4_packet::new_unchecked_mut(&mut datagram.buffer[..total_len])
            .set_checksum(checksum);

        Ok(datagram)
    }
}

/// The decomposition of a received datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Parsed<'a> {
    /// The parsed IP header.
    pub ip: Ipv4Repr,
    /// The length of the IP header, in octets.
    pub ip_header_len: usize,
    /// The parsed TCP header.
    pub tcp: TcpRepr,
    /// The length of the TCP header including options, in octets.
    pub tcp_header_len: usize,
    /// The application payload following both headers.
    pub payload: &'a [u8],
}

/// Split a received raw buffer into IP header, TCP header and payload.
///
/// A datagram whose IP total length cannot accommodate the TCP header it
/// claims is rejected with `Err(Error::Malformed)` rather than carved into
/// an impossible payload slice.
pub fn parse(buffer: &[u8]) -> Result<Parsed<'_>> {
    let packet = ipv4_packet::new_checked(buffer)?;
    let ip = Ipv4Repr::parse(packet)?;
    let ip_header_len = usize::from(packet.header_len());

    let ip_payload = packet.payload_slice();
    let segment = match tcp_segment::new_checked(ip_payload) {
        Ok(segment) => segment,
        // The IP total length vouched for this buffer, so a TCP header
        // that does not fit within it is a contradiction inside the
        // datagram itself, not a short read.
        Err(Error::Truncated) => return Err(Error::Malformed),
        Err(err) => return Err(err),
    };
    let tcp = TcpRepr::parse(segment)?;
    let tcp_header_len = usize::from(segment.header_len());

    Ok(Parsed {
        ip,
        ip_header_len,
        tcp,
        tcp_header_len,
        payload: &ip_payload[tcp_header_len..],
    })
}

/// Read the sequence and acknowledgment numbers at their fixed offsets.
///
/// Assumes a twenty-octet IP header with no options, which holds for all
/// traffic of a session speaking this crate's own wire format. Not a
/// general-purpose accessor; use [`parse`] for datagrams of unknown shape.
///
/// [`parse`]: fn.parse.html
pub fn read_seq_and_ack(buffer: &[u8]) -> Result<(u32, u32)> {
    if buffer.len() < ACK_OFFSET + 4 {
        return Err(Error::Truncated);
    }
    let seq = NetworkEndian::read_u32(&buffer[SEQ_OFFSET..SEQ_OFFSET + 4]);
    let ack = NetworkEndian::read_u32(&buffer[ACK_OFFSET..ACK_OFFSET + 4]);
    Ok((seq, ack))
}

/// Derive the next outgoing seq/ack pair from a received segment.
///
/// Standard turn-taking: the peer's acknowledgment becomes our sequence
/// number, and the peer's sequence number plus one, counting the control
/// octet, becomes our acknowledgment.
pub fn update_seq_and_ack(buffer: &[u8]) -> Result<(u32, u32)> {
    let (seq, ack) = read_seq_and_ack(buffer)?;
    Ok((ack, seq.wrapping_add(1)))
}

/// Read the TCP destination port at its fixed offset.
///
/// Used by receive filters to decide whether a raw datagram belongs to the
/// session at all, before any full parse. Same fixed-shape assumption as
/// [`read_seq_and_ack`].
///
/// [`read_seq_and_ack`]: fn.read_seq_and_ack.html
pub fn read_dst_port(buffer: &[u8]) -> Result<u16> {
    if buffer.len() < DST_PORT_OFFSET + 2 {
        return Err(Error::Truncated);
    }
    Ok(NetworkEndian::read_u16(&buffer[DST_PORT_OFFSET..DST_PORT_OFFSET + 2]))
}
