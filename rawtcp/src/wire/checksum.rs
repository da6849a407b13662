//! The RFC 1071 Internet checksum.
//!
//! Used twice per assembled datagram: once over the IPv4 header alone and
//! once over the TCP pseudo-header, header, options and payload combined.
//!
//! The accumulation sums 16-bit words in network byte order, one of the two
//! self-consistent readings of RFC 1071 §4. Host-order summation produces a
//! byte-identical result on the wire, as long as the final value is stored
//! in the same order it was summed in.
use byteorder::{ByteOrder, NetworkEndian};

use super::{Ipv4Address, IpProtocol};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 compliant checksum (without the final complement).
///
/// Any buffer length is valid; an odd trailing byte is zero-extended into a
/// final 16-bit word and a zero-length buffer sums to zero.
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        data = &data[CHUNK_SIZE..];
    }

    // Sum the rest that does not fit the last 32-byte chunk,
    // taking by 2 bytes.
    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // Add the last remaining odd byte, if any.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Compute the TCP pseudo-header checksum.
///
/// The pseudo-header consists of the source address, destination address,
/// a zero byte, the protocol number and the TCP segment length (header plus
/// options plus payload). It exists only as checksum input and is never
/// transmitted.
pub fn pseudo_header(src_addr: Ipv4Address, dst_addr: Ipv4Address,
                     protocol: IpProtocol, length: u32) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol.into();
    NetworkEndian::write_u16(&mut proto_len[2..4], length as u16);

    combine(&[
        data(src_addr.as_bytes()),
        data(dst_addr.as_bytes()),
        data(&proto_len[..])
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        // The complement of a zero sum.
        assert_eq!(!data(&[]), 0xffff);
    }

    #[test]
    fn odd_trailing_byte() {
        // 0xab00 is the zero-extended final word.
        assert_eq!(data(&[0xab]), 0xab00);
        assert_eq!(data(&[0x00, 0x01, 0xab]), 0xab01);
    }

    #[test]
    fn carry_folding_is_a_fixed_point() {
        // Folding an already folded sum must not produce another carry.
        let buffers: &[&[u8]] = &[
            &[0xff; 64],
            &[0xff, 0xff, 0x00, 0x01],
            &[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc],
        ];
        for buffer in buffers {
            let folded = data(buffer);
            assert_eq!(combine(&[folded]), folded);
        }
    }

    #[test]
    fn self_verification() {
        // An IPv4 header with the checksum field zeroed: inserting the
        // complemented sum and summing again yields the all-ones pattern,
        // i.e. the complement recomputes to zero.
        let mut header = [
            0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00,
            0x40, 0x06, 0x00, 0x00, 0xac, 0x10, 0x0a, 0x63,
            0xac, 0x10, 0x0a, 0x0c,
        ];
        let checksum = !data(&header);
        NetworkEndian::write_u16(&mut header[10..12], checksum);
        assert_eq!(!data(&header), 0);
    }

    #[test]
    fn pseudo_header_known_value() {
        let sum = pseudo_header(
            Ipv4Address::new(10, 0, 0, 1),
            Ipv4Address::new(10, 0, 0, 2),
            IpProtocol::Tcp,
            40);
        // 0x0a00 + 0x0001 + 0x0a00 + 0x0002 + 0x0006 + 0x0028
        assert_eq!(sum, 0x1431);
    }
}
