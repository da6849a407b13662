//! A raw TCP client example.
//!
//! Connects to a given remote host with a hand-built three-way handshake,
//! pushes a single message and follows the peer's teardown. The kernel's
//! TCP stack never sees the connection; only the raw socket does.
//!
//! Requires `CAP_NET_RAW`. The kernel will answer the peer's SYN-ACK with a
//! RST of its own unless the source port is shielded from it, e.g. with an
//! iptables rule dropping outgoing RST segments for that port. Call example:
//!
//! * `rawtcp-send 192.168.2.109 4000 192.168.2.100 80 -m "TEST TEST."`
use rawtcp_send::config::Config;

use std::process;

fn main() {
    let config = Config::from_args();

    if let Err(err) = rawtcp_send::run(&config) {
        eprintln!("[-] {}", err);
        process::exit(1);
    }
}
