// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
use super::{ifreq, Errno, LibcResult, IoctlResult};
use libc;

use crate::wire::{EthernetAddress, Ipv4Address};

pub(crate) const ETH_P_ALL: libc::c_short = 0x0003;

/// Adds a method to query the interface index.
pub(crate) trait IfIndex {
    fn get_if_index(&mut self, fd: libc::c_int) -> Result<libc::c_int, Errno>;
}

/// Adds a method to query the interface hardware address.
pub(crate) trait HardwareAddr {
    fn get_hardware_addr(&mut self, fd: libc::c_int) -> Result<EthernetAddress, Errno>;
}

/// Adds a method to query the interface IPv4 address.
pub(crate) trait ProtocolAddr {
    fn get_protocol_addr(&mut self, fd: libc::c_int) -> Result<Ipv4Address, Errno>;
}

impl ifreq {
    pub(crate) const SIOCGIFADDR:   libc::Ioctl = 0x8915;
    pub(crate) const SIOCGIFHWADDR: libc::Ioctl = 0x8927;
    pub(crate) const SIOCGIFINDEX:  libc::Ioctl = 0x8933;
}

impl IfIndex for ifreq {
    fn get_if_index(&mut self, fd: libc::c_int) -> Result<libc::c_int, Errno> {
        #[repr(C)]
        struct Request {
            interface: ifreq,
            ifr_ifindex: libc::c_int,
        }

        let mut request = Request {
            interface: *self,
            ifr_ifindex: 0,
        };

        let res = unsafe {
            libc::ioctl(fd, Self::SIOCGIFINDEX, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        Ok(request.ifr_ifindex)
    }
}

impl HardwareAddr for ifreq {
    fn get_hardware_addr(&mut self, fd: libc::c_int) -> Result<EthernetAddress, Errno> {
        #[repr(C)]
        struct Request {
            interface: ifreq,
            ifr_hwaddr: libc::sockaddr,
        }

        let mut request = Request {
            interface: *self,
            ifr_hwaddr: libc::sockaddr {
                sa_family: 0,
                sa_data: [0; 14],
            },
        };

        let res = unsafe {
            libc::ioctl(fd, Self::SIOCGIFHWADDR, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        let mut addr = [0u8; 6];
        for (octet, raw) in addr.iter_mut().zip(request.ifr_hwaddr.sa_data.iter()) {
            *octet = *raw as u8;
        }
        Ok(EthernetAddress(addr))
    }
}

impl ProtocolAddr for ifreq {
    fn get_protocol_addr(&mut self, fd: libc::c_int) -> Result<Ipv4Address, Errno> {
        #[repr(C)]
        struct Request {
            interface: ifreq,
            ifr_addr: libc::sockaddr_in,
        }

        let mut request = Request {
            interface: *self,
            ifr_addr: libc::sockaddr_in {
                sin_family: 0,
                sin_port: 0,
                sin_addr: libc::in_addr { s_addr: 0 },
                sin_zero: [0; 8],
            },
        };

        let res = unsafe {
            libc::ioctl(fd, Self::SIOCGIFADDR, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        Ok(Ipv4Address(request.ifr_addr.sin_addr.s_addr.to_ne_bytes()))
    }
}
