// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use libc;
use super::{Errno, FdResult, IoLenResult, LibcResult};

use crate::datagram;
use crate::session::{self, Transport};
use crate::wire::Endpoint;

/// A blocking `AF_INET` raw socket carrying self-built IP datagrams.
///
/// `IP_HDRINCL` is set so the kernel transmits the caller's IP header
/// verbatim instead of prepending its own. The kernel still picks the route
/// and handles the link layer. Reception sees every TCP datagram delivered
/// to the host, which is why [`recv_matching`] filters by destination port.
///
/// [`recv_matching`]: #method.recv_matching
#[derive(Debug)]
pub struct RawSocket {
    lower: libc::c_int,
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl RawSocket {
    /// Open a raw TCP socket with header inclusion enabled.
    ///
    /// Requires `CAP_NET_RAW` or root.
    pub fn new() -> Result<RawSocket, Errno> {
        let lower = unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_RAW,
                libc::IPPROTO_TCP)
        };

        FdResult(lower).errno()?;
        let socket = RawSocket { lower };

        let one: libc::c_int = 1;
        let res = unsafe {
            libc::setsockopt(
                socket.lower,
                libc::IPPROTO_IP,
                libc::IP_HDRINCL,
                &one as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t)
        };
        FdResult(res).errno()?;

        Ok(socket)
    }

    fn sockaddr(dst: Endpoint) -> libc::sockaddr_in {
        libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port:   dst.port.to_be(),
            sin_addr:   libc::in_addr {
                s_addr: u32::from_ne_bytes(dst.addr.0),
            },
            sin_zero:   [0; 8],
        }
    }

    /// Send a single datagram towards the destination.
    ///
    /// The destination address in the sockaddr only steers routing; the
    /// addresses the peer sees are the ones inside `buffer`.
    pub fn send_to(&self, buffer: &[u8], dst: Endpoint) -> Result<usize, Errno> {
        let sockaddr = Self::sockaddr(dst);
        let len = unsafe {
            libc::sendto(
                self.lower,
                buffer.as_ptr() as *const libc::c_void,
                buffer.len(),
                0,
                &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Receive a single datagram, blocking until one arrives.
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize, Errno> {
        let len = unsafe {
            libc::recv(
                self.lower,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Receive the next datagram whose TCP destination port matches.
    ///
    /// Loops over [`recv`], silently discarding datagrams for other ports
    /// and datagrams too short to carry a port at all. Blocks indefinitely
    /// when nothing matching arrives.
    ///
    /// [`recv`]: #method.recv
    pub fn recv_matching(&self, buffer: &mut [u8], local_port: u16)
        -> Result<usize, Errno>
    {
        recv_matching_from(|buffer| self.recv(buffer), buffer, local_port)
    }
}

/// Drive `recv` until it produces a datagram addressed to `local_port`.
///
/// Datagrams for other ports and datagrams too short to carry a port at
/// all are dropped without comment. Errors from `recv` end the loop.
fn recv_matching_from<R>(mut recv: R, buffer: &mut [u8], local_port: u16)
    -> Result<usize, Errno>
where
    R: FnMut(&mut [u8]) -> Result<usize, Errno>,
{
    loop {
        let len = recv(buffer)?;
        match datagram::read_dst_port(&buffer[..len]) {
            Ok(port) if port == local_port => return Ok(len),
            Ok(_) | Err(_) => continue,
        }
    }
}

impl Transport for RawSocket {
    fn send(&mut self, buffer: &[u8], dst: Endpoint) -> Result<usize, session::Error> {
        Ok(self.send_to(buffer, dst)?)
    }

    fn recv(&mut self, buffer: &mut [u8], local_port: u16) -> Result<usize, session::Error> {
        Ok(self.recv_matching(buffer, local_port)?)
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::{Builder, Intent};
    use crate::isn;
    use crate::wire::Ipv4Address;
    use std::collections::VecDeque;

    fn syn_for_port(port: u16) -> Vec<u8> {
        let local = Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 9999);
        let remote = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), port);
        let mut builder = Builder::with_generator(
            local, remote, isn::Generator::from_secret_key(7, 9));
        builder.build(Intent::Syn, &[]).unwrap().as_bytes().to_vec()
    }

    #[test]
    fn foreign_and_short_datagrams_are_skipped() {
        let mut incoming: VecDeque<Vec<u8>> = vec![
            syn_for_port(8080),
            vec![0u8; 16],
            syn_for_port(4000),
        ].into();

        let mut buffer = [0u8; 4096];
        let len = recv_matching_from(|buffer| {
            let next = incoming.pop_front().expect("ran past the script");
            buffer[..next.len()].copy_from_slice(&next);
            Ok(next.len())
        }, &mut buffer, 4000).unwrap();

        assert_eq!(len, 60);
        assert_eq!(datagram::read_dst_port(&buffer[..len]), Ok(4000));
        assert!(incoming.is_empty());
    }

    #[test]
    fn receive_errors_end_the_loop() {
        let mut buffer = [0u8; 64];
        let res = recv_matching_from(
            |_: &mut [u8]| Err(Errno(libc::EINTR)), &mut buffer, 4000);
        assert_eq!(res, Err(Errno(libc::EINTR)));
    }
}
