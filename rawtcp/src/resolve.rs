/*! Broadcast ARP address resolution.

Answers the one question the link-layer framed variant cannot avoid: which
hardware address does a given IPv4 address live at. A single who-has
request goes out to the broadcast address and the first matching is-at
reply wins. Resolution of the interface's own address short-circuits
without touching the wire.

Like everything else in this crate the exchange blocks without a timeout,
so resolving an address nobody owns blocks forever.
*/

use crate::sys::{Errno, PacketSocket};
use crate::wire::{
    arp_packet, ethernet_frame,
    ArpOperation, ArpRepr, EthernetAddress, EthernetProtocol, EthernetRepr,
    Ipv4Address, ETHERNET_HEADER_LEN};

// Enough for any frame the exchange can produce.
const FRAME_LEN: usize = 1522;

fn request_frame(socket: &PacketSocket, target: Ipv4Address)
    -> [u8; ETHERNET_HEADER_LEN + 28]
{
    let ethernet_repr = EthernetRepr {
        dst_addr:  EthernetAddress::BROADCAST,
        src_addr:  socket.hardware_addr(),
        ethertype: EthernetProtocol::Arp,
    };
    let arp_repr = ArpRepr {
        operation:            ArpOperation::Request,
        source_hardware_addr: socket.hardware_addr(),
        source_protocol_addr: socket.protocol_addr(),
        target_hardware_addr: EthernetAddress([0; 6]),
        target_protocol_addr: target,
    };

    let mut buffer = [0u8; ETHERNET_HEADER_LEN + 28];
    let frame = ethernet_frame::new_unchecked_mut(&mut buffer);
    ethernet_repr.emit(frame);
    arp_repr.emit(arp_packet::new_unchecked_mut(frame.payload_mut_slice()));
    buffer
}

/// Is-at answer for one received frame, if it is one.
fn matching_reply(frame: &[u8], target: Ipv4Address) -> Option<EthernetAddress> {
    let frame = ethernet_frame::new_checked(frame).ok()?;
    if frame.ethertype() != EthernetProtocol::Arp {
        return None;
    }
    let repr = ArpRepr::parse(arp_packet::new_unchecked(frame.payload_slice())).ok()?;
    if repr.operation == ArpOperation::Reply && repr.source_protocol_addr == target {
        Some(repr.source_hardware_addr)
    } else {
        None
    }
}

/// Resolve an IPv4 address to a hardware address on the given interface.
///
/// Returns the interface's own hardware address immediately when `target`
/// is the interface's own IPv4 address. Otherwise broadcasts a who-has
/// request and blocks until a matching reply arrives.
pub fn resolve(interface: &str, target: Ipv4Address) -> Result<EthernetAddress, Errno> {
    let socket = PacketSocket::open(interface)?;
    resolve_on(&socket, target)
}

/// Like [`resolve`], on an already opened socket.
///
/// [`resolve`]: fn.resolve.html
pub fn resolve_on(socket: &PacketSocket, target: Ipv4Address)
    -> Result<EthernetAddress, Errno>
{
    if target == socket.protocol_addr() {
        return Ok(socket.hardware_addr());
    }

    socket.send(&request_frame(socket, target))?;

    let mut buffer = [0u8; FRAME_LEN];
    loop {
        let len = socket.recv(&mut buffer)?;
        if let Some(addr) = matching_reply(&buffer[..len], target) {
            return Ok(addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ArpHardware;

    fn reply_frame(sender_hw: EthernetAddress, sender_ip: Ipv4Address) -> Vec<u8> {
        let ethernet_repr = EthernetRepr {
            dst_addr:  EthernetAddress([0x11; 6]),
            src_addr:  sender_hw,
            ethertype: EthernetProtocol::Arp,
        };
        let arp_repr = ArpRepr {
            operation:            ArpOperation::Reply,
            source_hardware_addr: sender_hw,
            source_protocol_addr: sender_ip,
            target_hardware_addr: EthernetAddress([0x11; 6]),
            target_protocol_addr: Ipv4Address::new(192, 168, 2, 109),
        };

        let mut buffer = vec![0u8; ETHERNET_HEADER_LEN + arp_repr.buffer_len()];
        let frame = ethernet_frame::new_unchecked_mut(&mut buffer);
        ethernet_repr.emit(frame);
        arp_repr.emit(arp_packet::new_unchecked_mut(frame.payload_mut_slice()));
        buffer
    }

    #[test]
    fn reply_for_the_right_address_matches() {
        let hw = EthernetAddress([0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let ip = Ipv4Address::new(192, 168, 2, 100);
        let frame = reply_frame(hw, ip);

        assert_eq!(matching_reply(&frame, ip), Some(hw));
        assert_eq!(matching_reply(&frame, Ipv4Address::new(192, 168, 2, 101)), None);
    }

    #[test]
    fn non_arp_traffic_is_ignored() {
        let hw = EthernetAddress([0x22; 6]);
        let ip = Ipv4Address::new(192, 168, 2, 100);
        let mut frame = reply_frame(hw, ip);
        // Flip the ethertype to IPv4.
        frame[12] = 0x08;
        frame[13] = 0x00;

        assert_eq!(matching_reply(&frame, ip), None);
        assert_eq!(matching_reply(&frame[..10], ip), None);
    }

    #[test]
    fn hardware_field_sanity() {
        // The emitted request claims Ethernet/IPv4 in its fixed fields.
        let frame = reply_frame(EthernetAddress([1; 6]), Ipv4Address::new(1, 2, 3, 4));
        let packet = arp_packet::new_checked(&frame[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.hardware_type(), ArpHardware::Ethernet);
        assert_eq!(packet.hardware_len(), 6);
        assert_eq!(packet.protocol_len(), 4);
    }
}
