/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation*. It provides two
levels of functionality.

 * First, it provides functions to extract fields from sequences of octets,
   and to insert fields into sequences of octets. This happens in the
   lowercase byte-wrapper structures, e.g. [`ipv4`] or [`tcp`].
 * Second, it provides a compact, high-level representation of header data
   that can be created from parsing and emitted into a sequence of octets.
   This happens through the `Repr` family of structs and enums, e.g.
   [`Ipv4Repr`] or [`TcpRepr`].

[`ipv4`]: struct.ipv4.html
[`tcp`]: struct.tcp.html
[`Ipv4Repr`]: struct.Ipv4Repr.html
[`TcpRepr`]: struct.TcpRepr.html

The byte-wrapper family guarantees that, if `check_len()` returned `Ok(())`,
then no field accessor or setter method will panic. When parsing untrusted
input it is *necessary* to go through `new_checked`; so long as the buffer
is not truncated afterwards, no accessor will fail.

All multi-byte header fields are big-endian (network byte order) as mandated
by the protocols, accessed through `byteorder::NetworkEndian`.
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `arp.rs`
// * `checksum.rs`
// * `error.rs`
// * `ethernet.rs`
// * `ipv4.rs`
// * `mod.rs` (this file)
// * `tcp.rs`

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod arp;
pub mod checksum;
mod error;
mod ethernet;
mod ipv4;
mod tcp;

pub use self::error::{
    Error,
    Result};

pub use self::ethernet::{
    ethernet as ethernet_frame,
    EtherType as EthernetProtocol,
    Address as EthernetAddress,
    Repr as EthernetRepr,
    HEADER_LEN as ETHERNET_HEADER_LEN};

pub use self::arp::{
    arp as arp_packet,
    Hardware as ArpHardware,
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    Endpoint,
    Protocol as IpProtocol,
    Repr as Ipv4Repr,
    BASE_HEADER_LEN as IPV4_HEADER_LEN};

pub use self::tcp::{
    tcp as tcp_segment,
    Flags as TcpFlags,
    TcpOption,
    Repr as TcpRepr,
    BASE_HEADER_LEN as TCP_BASE_HEADER_LEN,
    OPTIONS_LEN as TCP_OPTIONS_LEN,
    DEFAULT_WINDOW,
    DEFAULT_MSS};
