// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use libc;
use super::{ifreq, linux, Errno, FdResult, IoLenResult, LibcResult};
use super::linux::{HardwareAddr, IfIndex, ProtocolAddr};

use crate::datagram::{self, DATAGRAM_LEN};
use crate::session::{self, Transport};
use crate::wire::{
    ethernet_frame,
    Endpoint, EthernetAddress, EthernetProtocol, EthernetRepr, Ipv4Address,
    ETHERNET_HEADER_LEN};

/// A blocking `AF_PACKET` socket bound to one interface.
///
/// Frames cross this socket with their Ethernet header in place, so the
/// caller controls, and must supply, the link-layer addressing. The local
/// hardware and IPv4 addresses of the interface are read once at open time
/// via ioctl and cached.
#[derive(Debug)]
pub struct PacketSocket {
    lower: libc::c_int,
    if_index: libc::c_int,
    hardware_addr: EthernetAddress,
    protocol_addr: Ipv4Address,
}

impl AsRawFd for PacketSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl PacketSocket {
    /// Open a packet socket and bind it to the named interface.
    ///
    /// Requires `CAP_NET_RAW` or root.
    pub fn open(name: &str) -> Result<PacketSocket, Errno> {
        let lower = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                linux::ETH_P_ALL.to_be() as i32)
        };

        FdResult(lower).errno()?;
        let mut socket = PacketSocket {
            lower,
            if_index: 0,
            hardware_addr: EthernetAddress([0; 6]),
            protocol_addr: Ipv4Address::UNSPECIFIED,
        };

        let mut ifreq = ifreq::new(name);
        socket.if_index = ifreq.get_if_index(socket.lower)?;
        socket.hardware_addr = ifreq.get_hardware_addr(socket.lower)?;
        socket.protocol_addr = ifreq.get_protocol_addr(socket.lower)?;
        socket.bind_interface()?;

        Ok(socket)
    }

    fn bind_interface(&mut self) -> Result<(), Errno> {
        let sockaddr = libc::sockaddr_ll {
            sll_family:   libc::AF_PACKET as u16,
            sll_protocol: linux::ETH_P_ALL.to_be() as u16,
            sll_ifindex:  self.if_index,
            sll_hatype:   1,
            sll_pkttype:  0,
            sll_halen:    6,
            sll_addr:     [0; 8],
        };

        let res = unsafe {
            libc::bind(
                self.lower,
                &sockaddr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as u32)
        };

        FdResult(res).errno()
    }

    /// The hardware address of the bound interface.
    pub fn hardware_addr(&self) -> EthernetAddress {
        self.hardware_addr
    }

    /// The IPv4 address of the bound interface.
    pub fn protocol_addr(&self) -> Ipv4Address {
        self.protocol_addr
    }

    /// Send a single frame, Ethernet header included.
    pub fn send(&self, frame: &[u8]) -> Result<usize, Errno> {
        let len = unsafe {
            libc::send(
                self.lower,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Receive a single frame, blocking until one arrives.
    pub fn recv(&self, frame: &mut [u8]) -> Result<usize, Errno> {
        let len = unsafe {
            libc::recv(
                self.lower,
                frame.as_mut_ptr() as *mut libc::c_void,
                frame.len(),
                0)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }
}

impl Drop for PacketSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

/// A [`PacketSocket`] speaking IP datagrams in Ethernet frames.
///
/// Outgoing datagrams are framed towards one fixed peer hardware address,
/// normally obtained from [`resolve`]. Incoming frames are unframed and
/// filtered the way [`RawSocket`] filters: anything that is not IPv4
/// addressed to the expected TCP port is dropped without comment. Note
/// that with `ETH_P_ALL` the socket also sees the host's own outgoing
/// frames; the port filter discards those too, since they carry the peer's
/// port, not ours.
///
/// [`PacketSocket`]: struct.PacketSocket.html
/// [`RawSocket`]: struct.RawSocket.html
/// [`resolve`]: ../resolve/fn.resolve.html
#[derive(Debug)]
pub struct EthernetChannel {
    socket: PacketSocket,
    peer_addr: EthernetAddress,
}

impl EthernetChannel {
    /// Bind an open socket to one resolved peer.
    pub fn new(socket: PacketSocket, peer_addr: EthernetAddress) -> EthernetChannel {
        EthernetChannel { socket, peer_addr }
    }

    /// The underlying packet socket.
    pub fn socket(&self) -> &PacketSocket {
        &self.socket
    }
}

/// Put `datagram` into an Ethernet frame, returning the frame length.
fn frame_datagram(
    buffer: &mut [u8],
    src_addr: EthernetAddress,
    dst_addr: EthernetAddress,
    datagram: &[u8],
) -> usize {
    let len = ETHERNET_HEADER_LEN + datagram.len();
    let repr = EthernetRepr {
        dst_addr,
        src_addr,
        ethertype: EthernetProtocol::Ipv4,
    };
    let frame = ethernet_frame::new_unchecked_mut(&mut buffer[..len]);
    repr.emit(frame);
    frame.payload_mut_slice().copy_from_slice(datagram);
    len
}

/// The datagram for `local_port` inside one received frame, if it is one.
///
/// The returned slice may still carry link-layer padding after the IP
/// total length; the full parse trims it.
fn matching_datagram(frame: &[u8], local_port: u16) -> Option<&[u8]> {
    let frame = ethernet_frame::new_checked(frame).ok()?;
    if frame.ethertype() != EthernetProtocol::Ipv4 {
        return None;
    }
    let datagram = frame.payload_slice();
    match datagram::read_dst_port(datagram) {
        Ok(port) if port == local_port => Some(datagram),
        _ => None,
    }
}

impl Transport for EthernetChannel {
    fn send(&mut self, buffer: &[u8], _dst: Endpoint) -> Result<usize, session::Error> {
        if buffer.len() > DATAGRAM_LEN {
            return Err(crate::wire::Error::Exhausted.into());
        }
        let mut staged = [0u8; ETHERNET_HEADER_LEN + DATAGRAM_LEN];
        let len = frame_datagram(
            &mut staged,
            self.socket.hardware_addr(),
            self.peer_addr,
            buffer);
        let sent = self.socket.send(&staged[..len])?;
        Ok(sent.saturating_sub(ETHERNET_HEADER_LEN))
    }

    fn recv(&mut self, buffer: &mut [u8], local_port: u16) -> Result<usize, session::Error> {
        let mut staged = [0u8; ETHERNET_HEADER_LEN + DATAGRAM_LEN];
        loop {
            let len = self.socket.recv(&mut staged)?;
            if let Some(datagram) = matching_datagram(&staged[..len], local_port) {
                let len = datagram.len().min(buffer.len());
                buffer[..len].copy_from_slice(&datagram[..len]);
                return Ok(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::{Builder, Intent};
    use crate::isn;

    fn sample_datagram(dst_port: u16) -> crate::datagram::Datagram {
        let local = Endpoint::new(Ipv4Address::new(192, 168, 2, 109), 9999);
        let remote = Endpoint::new(Ipv4Address::new(192, 168, 2, 1), dst_port);
        Builder::with_generator(local, remote, isn::Generator::from_secret_key(3, 5))
            .build(Intent::Syn, &[])
            .unwrap()
    }

    #[test]
    fn framing_round_trips_the_datagram() {
        let datagram = sample_datagram(80);
        let src = EthernetAddress([0x02; 6]);
        let dst = EthernetAddress([0x04; 6]);

        let mut staged = [0u8; ETHERNET_HEADER_LEN + DATAGRAM_LEN];
        let len = frame_datagram(&mut staged, src, dst, datagram.as_bytes());
        assert_eq!(len, ETHERNET_HEADER_LEN + datagram.len());

        let frame = ethernet_frame::new_checked(&staged[..len]).unwrap();
        assert_eq!(frame.dst_addr(), dst);
        assert_eq!(frame.src_addr(), src);
        assert_eq!(frame.ethertype(), EthernetProtocol::Ipv4);
        assert_eq!(matching_datagram(&staged[..len], 80),
                   Some(datagram.as_bytes()));
    }

    #[test]
    fn unframing_filters_foreign_traffic() {
        let datagram = sample_datagram(80);
        let mut staged = [0u8; ETHERNET_HEADER_LEN + DATAGRAM_LEN];
        let len = frame_datagram(
            &mut staged,
            EthernetAddress([0x02; 6]),
            EthernetAddress([0x04; 6]),
            datagram.as_bytes());

        // Wrong port, then non-IPv4 ethertype, then a runt frame.
        assert_eq!(matching_datagram(&staged[..len], 81), None);
        staged[12] = 0x08;
        staged[13] = 0x06;
        assert_eq!(matching_datagram(&staged[..len], 80), None);
        assert_eq!(matching_datagram(&staged[..10], 80), None);
    }

    #[test]
    fn trailing_frame_padding_is_harmless() {
        let datagram = sample_datagram(80);
        let mut staged = [0u8; ETHERNET_HEADER_LEN + DATAGRAM_LEN];
        let len = frame_datagram(
            &mut staged,
            EthernetAddress([0x02; 6]),
            EthernetAddress([0x04; 6]),
            datagram.as_bytes());

        let unframed = matching_datagram(&staged[..len + 6], 80).unwrap();
        assert_eq!(unframed.len(), datagram.len() + 6);
        let parsed = datagram::parse(unframed).unwrap();
        assert_eq!(parsed.payload, &[] as &[u8]);
    }
}
