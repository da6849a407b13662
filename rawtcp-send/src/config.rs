use structopt::StructOpt;
use std::net;

use rawtcp::wire::{Endpoint, Ipv4Address};

/// Command line options of the client.
///
/// The four positional arguments mirror the addressing of the datagrams on
/// the wire; nothing is looked up from the host's own configuration unless
/// an interface is named for ARP resolution.
#[derive(Clone, Debug, StructOpt)]
pub struct Config {
    /// Source address written into outgoing IP headers.
    pub src_ip: net::Ipv4Addr,
    /// Source port, also the filter for incoming datagrams.
    pub src_port: u16,
    /// Destination address.
    pub dst_ip: net::Ipv4Addr,
    /// Destination port.
    pub dst_port: u16,

    /// Payload pushed once the connection is established.
    #[structopt(short = "m", long = "message", default_value = "TEST TEST.")]
    pub message: String,

    /// Resolve the destination's hardware address on this interface first.
    #[structopt(short = "i", long = "interface")]
    pub interface: Option<String>,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    pub fn local(&self) -> Endpoint {
        Endpoint::new(Ipv4Address::from(self.src_ip), self.src_port)
    }

    pub fn remote(&self) -> Endpoint {
        Endpoint::new(Ipv4Address::from(self.dst_ip), self.dst_port)
    }
}
