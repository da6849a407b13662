pub mod config;

use rawtcp::datagram::{self, Datagram, DATAGRAM_LEN};
use rawtcp::resolve;
use rawtcp::session::{Error, Reply, Session, Transport};
use rawtcp::sys::{EthernetChannel, PacketSocket, RawSocket};
use rawtcp::wire::Endpoint;

/// Run one conversation as described by the command line.
///
/// With `-i <interface>` the conversation is framed in Ethernet over a
/// packet socket, towards the hardware address ARP resolution yields for
/// the destination. Without it a raw IP socket lets the kernel handle the
/// link layer.
pub fn run(config: &config::Config) -> Result<(), Error> {
    let local = config.local();
    let remote = config.remote();

    println!("SETUP:");
    match &config.interface {
        Some(interface) => {
            let socket = PacketSocket::open(interface).map_err(Error::from)?;
            let peer = resolve::resolve_on(&socket, remote.addr).map_err(Error::from)?;
            println!("[+] {} is-at {}", remote.addr, peer);
            println!("[+] Packet socket open on {}, {} -> {}",
                     interface, local, remote);
            converse(EthernetChannel::new(socket, peer), local, remote, &config.message)
        }
        None => {
            let socket = RawSocket::new().map_err(Error::from)?;
            println!("[+] Raw socket open, {} -> {}", local, remote);
            converse(socket, local, remote, &config.message)
        }
    }
}

/// Drive one conversation over an opened transport.
///
/// Unlike [`Session::run`] this steps the session by hand so that every
/// datagram can be reported as it crosses the socket.
///
/// [`Session::run`]: ../rawtcp/session/struct.Session.html#method.run
fn converse<T: Transport>(
    mut socket: T,
    local: Endpoint,
    remote: Endpoint,
    message: &str,
) -> Result<(), Error> {
    let mut session = Session::new(local, remote);
    let mut buffer = [0u8; DATAGRAM_LEN];

    println!("TCP-HANDSHAKE:");
    let syn = session.open()?;
    transmit(&mut socket, remote, &syn)?;

    let received = receive(&mut socket, &mut buffer, local)?;
    match session.handle(received)? {
        Reply::Send(ack) => transmit(&mut socket, remote, &ack)?,
        // The handshake phases never answer anything else.
        _ => return Err(Error::Phase(session.phase())),
    }
    println!("[+] Established, seq={} ack={}", session.seq(), session.ack());

    println!("TRANSFER:");
    let push = session.push(message.as_bytes())?;
    transmit(&mut socket, remote, &push)?;

    loop {
        let received = receive(&mut socket, &mut buffer, local)?;
        match session.handle(received)? {
            Reply::Quiet => (),
            Reply::Send(reply) => transmit(&mut socket, remote, &reply)?,
            Reply::Shutdown(fin) => {
                transmit(&mut socket, remote, &fin)?;
                session.close();
                break;
            }
        }
    }

    println!("[+] Connection closed");
    Ok(())
}

fn transmit<T: Transport>(transport: &mut T, remote: Endpoint, datagram: &Datagram)
    -> Result<(), Error>
{
    report("[OUT]", datagram.as_bytes());
    let sent = transport.send(datagram.as_bytes(), remote)?;
    if sent != datagram.len() {
        return Err(Error::ShortSend { sent, expected: datagram.len() });
    }
    Ok(())
}

fn receive<'a, T: Transport>(
    transport: &mut T,
    buffer: &'a mut [u8],
    local: Endpoint,
) -> Result<&'a [u8], Error> {
    let len = transport.recv(buffer, local.port)?;
    let received = &buffer[..len];
    report("[IN] ", received);
    Ok(received)
}

/// One line per datagram, plus a dump of any payload.
fn report(direction: &str, bytes: &[u8]) {
    match datagram::parse(bytes) {
        Ok(parsed) => {
            println!("{} seq={} ack={} len={} flags=({} )",
                     direction,
                     parsed.tcp.seq_number,
                     parsed.tcp.ack_number,
                     parsed.payload.len(),
                     parsed.tcp.flags);
            if !parsed.payload.is_empty() {
                hexdump(parsed.payload);
            }
        }
        Err(err) => println!("{} undecodable ({} octets): {}",
                             direction, bytes.len(), err),
    }
}

/// Sixteen octets per row, hex on the left, printable ASCII on the right.
fn hexdump(data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let mut hex = String::with_capacity(16 * 3);
        let mut text = String::with_capacity(16);
        for byte in chunk {
            hex.push_str(&format!("{:02x} ", byte));
            text.push(if byte.is_ascii_graphic() || *byte == b' ' {
                *byte as char
            } else {
                '.'
            });
        }
        println!("      {:04x}: {:48} {}", row * 16, hex, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawtcp::isn;
    use rawtcp::wire::{
        ipv4_packet, tcp_segment,
        IpProtocol, Ipv4Address, Ipv4Repr, TcpFlags, TcpRepr};
    use std::collections::VecDeque;

    /// A loopback stand-in so the full driver logic runs without sockets.
    struct Scripted {
        incoming: VecDeque<Vec<u8>>,
    }

    impl Transport for Scripted {
        fn send(&mut self, datagram: &[u8], _: Endpoint) -> Result<usize, Error> {
            Ok(datagram.len())
        }

        fn recv(&mut self, buffer: &mut [u8], _: u16) -> Result<usize, Error> {
            let next = self.incoming.pop_front().ok_or(Error::Transport(0))?;
            buffer[..next.len()].copy_from_slice(&next);
            Ok(next.len())
        }
    }

    #[test]
    fn transmit_reports_short_sends() {
        struct Half;
        impl Transport for Half {
            fn send(&mut self, datagram: &[u8], _: Endpoint) -> Result<usize, Error> {
                Ok(datagram.len() / 2)
            }
            fn recv(&mut self, _: &mut [u8], _: u16) -> Result<usize, Error> {
                Err(Error::Transport(0))
            }
        }

        let local = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 4000);
        let remote = Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 80);
        let mut session = Session::with_generator(
            local, remote, isn::Generator::from_secret_key(1, 2));
        let syn = session.open().unwrap();

        assert_eq!(transmit(&mut Half, remote, &syn).err(),
                   Some(Error::ShortSend { sent: 30, expected: 60 }));
    }

    /// Emit one segment as the peer at `remote` would send it.
    fn peer_segment(
        local: Endpoint,
        remote: Endpoint,
        flags: TcpFlags,
        seq: u32,
        ack: u32,
    ) -> Vec<u8> {
        let tcp_repr = TcpRepr {
            src_port:       remote.port,
            dst_port:       local.port,
            seq_number:     seq,
            ack_number:     ack,
            flags,
            window_len:     4096,
            max_seg_size:   None,
            sack_permitted: false,
            payload_len:    0,
        };
        let ip_repr = Ipv4Repr {
            src_addr:    remote.addr,
            dst_addr:    local.addr,
            protocol:    IpProtocol::Tcp,
            payload_len: tcp_repr.buffer_len(),
            ident:       7,
            ttl:         64,
        };

        let mut bytes = vec![0u8; ip_repr.total_len()];
        let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
        ip_repr.emit(packet);
        let segment = tcp_segment::new_unchecked_mut(packet.payload_mut_slice());
        tcp_repr.emit(segment);
        segment.fill_checksum(ip_repr.src_addr, ip_repr.dst_addr);
        packet.fill_checksum();
        bytes
    }

    #[test]
    fn conversation_completes_over_a_scripted_transport() {
        let local = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 4000);
        let remote = Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 80);

        let mut syn_ack = TcpFlags::default();
        syn_ack.set_syn(true);
        syn_ack.set_ack(true);
        let mut fin = TcpFlags::default();
        fin.set_fin(true);
        fin.set_ack(true);

        let transport = Scripted {
            incoming: vec![
                peer_segment(local, remote, syn_ack, 1000, 501),
                peer_segment(local, remote, fin, 1001, 502),
            ].into(),
        };

        assert!(converse(transport, local, remote, "TEST TEST.").is_ok());
    }

    #[test]
    fn receive_hands_back_the_datagram() {
        let mut transport = Scripted {
            incoming: vec![vec![0u8; 40]].into(),
        };
        let local = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 4000);
        let mut buffer = [0u8; DATAGRAM_LEN];
        let received = receive(&mut transport, &mut buffer, local).unwrap();
        assert_eq!(received.len(), 40);
    }
}
