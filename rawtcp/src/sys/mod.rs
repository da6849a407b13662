/*! Raw socket transports over libc.

Two flavours are provided. [`RawSocket`] is an `AF_INET` socket with
`IP_HDRINCL` set, so the kernel forwards self-built IP headers untouched and
handles the link layer itself. [`PacketSocket`] is an `AF_PACKET` socket
bound to one interface, where even the Ethernet framing is under caller
control; it exists for the ARP exchange in [`resolve`] and for hosts where
the routing shortcut of `AF_INET` is undesirable.

Both are synchronous and blocking, matching the session model.

[`RawSocket`]: struct.RawSocket.html
[`PacketSocket`]: struct.PacketSocket.html
[`resolve`]: ../resolve/index.html
*/
#![allow(unsafe_code)]
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `linux.rs`
// * `mod.rs` (this file)
// * `packet_socket.rs`
// * `raw_socket.rs`
use std::io;

use libc;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
mod packet_socket;
#[cfg(target_os = "linux")]
mod raw_socket;

#[cfg(target_os = "linux")]
pub use self::packet_socket::{EthernetChannel, PacketSocket};
#[cfg(target_os = "linux")]
pub use self::raw_socket::RawSocket;

/// An errno value.
///
/// This is used as the error representation of raw libc calls. It can be
/// converted into a `std::io::Error` where it will consequently have much
/// more extensive error information.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Errno(pub libc::c_int);

#[derive(Clone, Copy)]
struct FdResult(pub libc::c_int);

#[derive(Clone, Copy)]
struct IoLenResult(pub libc::ssize_t);

type IoctlResult = FdResult;
#[allow(non_snake_case)] // Emulate type alias also importing constructor.
fn IoctlResult(val: libc::c_int) -> IoctlResult { FdResult(val) }

/// Trait for interpreting integer return values.
trait LibcResult: Copy {
    fn is_fail(self) -> bool;

    fn errno(self) -> Result<(), Errno> {
        if self.is_fail() {
            Err(Errno::new())
        } else {
            Ok(())
        }
    }
}

impl Errno {
    /// Read the current errno of the calling thread.
    pub fn new() -> Errno {
        Errno(unsafe { *libc::__errno_location() })
    }
}

impl LibcResult for FdResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for IoLenResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl From<Errno> for io::Error {
    fn from(err: Errno) -> io::Error {
        io::Error::from_raw_os_error(err.0 as i32)
    }
}

impl From<Errno> for crate::session::Error {
    fn from(err: Errno) -> crate::session::Error {
        crate::session::Error::Transport(err.0 as i32)
    }
}

/// Base for an if ioctl request.
///
/// Contains the name of the interface.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct ifreq {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
}

impl ifreq {
    fn new(name: &str) -> Self {
        let mut ifr_name = [0; libc::IF_NAMESIZE];

        for (i, byte) in name.as_bytes().iter().enumerate() {
            ifr_name[i] = *byte as libc::c_char
        }

        ifreq {
            ifr_name,
        }
    }
}
