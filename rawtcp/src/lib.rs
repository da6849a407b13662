//! A hand-driven TCP/IPv4 client over raw sockets.
//!
//! The kernel's own TCP state machine is deliberately bypassed: every IPv4
//! and TCP header that leaves this library is assembled byte for byte,
//! including the Internet checksum and the TCP pseudo-header checksum, and
//! every received datagram is decoded back into structured header views by
//! hand.
//!
//! ## Table of contents
//!
//! 1. [The wire module](wire/index.html): field-level codecs for IPv4, TCP,
//!    Ethernet and ARP plus the RFC 1071 checksum engine.
//! 2. [The datagram module](datagram/index.html): intent-driven assembly of
//!    complete IP+TCP(+payload) datagrams and the matching parser.
//! 3. [The session module](session/index.html): the client-side
//!    handshake/transfer/teardown state machine and the [`Transport`] port
//!    it drives.
//! 4. [The sys module](sys/index.html): raw `AF_INET` and `AF_PACKET`
//!    socket transports (feature `"std"` only).
//! 5. [The resolve module](resolve/index.html): broadcast ARP resolution
//!    for the link-layer framed variant.
//!
//! [`Transport`]: session/trait.Transport.html
//!
//! ## Design
//!
//! Nothing in the core ever aliases a byte buffer as a typed header struct.
//! Field access goes through explicit accessors with defined endianness per
//! field, and the single 4096-byte [`Datagram`] buffer is an owned value
//! that moves from the builder to the transport; no component holds a
//! reference after passing it onward.
//!
//! [`Datagram`]: datagram/struct.Datagram.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod datagram;
pub mod isn;
pub mod session;
pub mod wire;

#[cfg(all(feature = "std", target_os = "linux"))]
pub mod resolve;
#[cfg(all(feature = "std", target_os = "linux"))]
pub mod sys;
