/*! The client-side handshake, transfer and teardown state machine.

A [`Session`] owns the rolling sequence/acknowledgment pair of one TCP
conversation and decides, for each received segment, which datagram to send
next. It never touches a socket itself; datagrams cross the boundary to a
[`Transport`] implementation by value.

The session can be driven two ways. [`Session::run`] executes the entire
conversation against a transport and blocks until teardown. Alternatively a
caller holds the loop itself with [`Session::open`], [`Session::push`] and
[`Session::handle`], which is what an interactive frontend does to report
each datagram as it passes.

[`Session`]: struct.Session.html
[`Transport`]: trait.Transport.html
[`Session::run`]: struct.Session.html#method.run
[`Session::open`]: struct.Session.html#method.open
[`Session::push`]: struct.Session.html#method.push
[`Session::handle`]: struct.Session.html#method.handle
*/

use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use crate::datagram::{self, Builder, Datagram, Intent, DATAGRAM_LEN, SEQ_ACK_PREFIX_LEN};
use crate::isn;
use crate::wire::{self, Endpoint};

/// Where in the conversation a session currently stands.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Phase {
    /// Nothing sent yet.
    Init,
    /// The SYN is out.
    SynSent,
    /// Blocking on the answer to the SYN.
    WaitSynAck,
    /// The handshake ACK is out, data not yet pushed.
    EstablishedSendAck,
    /// Data pushed, reacting to whatever the peer sends.
    Streaming,
    /// The FIN is built, the conversation ends once it is sent.
    Closing,
    /// Torn down.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::SynSent => "syn-sent",
            Phase::WaitSynAck => "wait-syn-ack",
            Phase::EstablishedSendAck => "established",
            Phase::Streaming => "streaming",
            Phase::Closing => "closing",
            Phase::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Errors of a session or of the transport beneath it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The requested operation does not fit the current phase.
    Phase(Phase),
    /// A datagram could not be built or decoded.
    Wire(wire::Error),
    /// The transport failed with the contained OS error code.
    Transport(i32),
    /// The transport accepted fewer octets than the datagram holds.
    ShortSend {
        /// Octets the transport reported as sent.
        sent: usize,
        /// Octets the datagram holds.
        expected: usize,
    },
}

impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Error {
        Error::Wire(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Phase(phase) =>
                write!(f, "operation illegal in phase {}", phase),
            Error::Wire(err) =>
                write!(f, "wire error: {}", err),
            Error::Transport(code) =>
                write!(f, "transport error, os code {}", code),
            Error::ShortSend { sent, expected } =>
                write!(f, "short send, {} of {} octets", sent, expected),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error { }

/// The boundary to whatever carries raw datagrams.
///
/// Both operations are synchronous. `recv` blocks until a datagram whose
/// embedded TCP destination port equals `local_port` arrives, silently
/// discarding everything else; there is no timeout, so an unresponsive peer
/// blocks the caller indefinitely.
pub trait Transport {
    /// Send one finished datagram towards `dst`, returning octets sent.
    fn send(&mut self, datagram: &[u8], dst: Endpoint) -> Result<usize, Error>;

    /// Receive the next datagram addressed to `local_port` into `buffer`.
    fn recv(&mut self, buffer: &mut [u8], local_port: u16) -> Result<usize, Error>;
}

/// The session's answer to one received segment.
#[derive(Debug)]
pub enum Reply {
    /// Nothing to send for this segment.
    Quiet,
    /// Send this and keep listening.
    Send(Datagram),
    /// Send this, then the conversation is over.
    Shutdown(Datagram),
}

/// One TCP conversation from SYN to FIN.
#[derive(Debug)]
pub struct Session {
    local: Endpoint,
    remote: Endpoint,
    builder: Builder,
    phase: Phase,
    seq: u32,
    ack: u32,
    outstanding: bool,
}

impl Session {
    /// Create a session with a randomly keyed sequence number generator.
    #[cfg(feature = "std")]
    pub fn new(local: Endpoint, remote: Endpoint) -> Session {
        Session::with_generator(local, remote, isn::Generator::from_std_hash())
    }

    /// Create a session with a caller-provided generator.
    pub fn with_generator(local: Endpoint, remote: Endpoint, generator: isn::Generator)
        -> Session
    {
        Session {
            local,
            remote,
            builder: Builder::with_generator(local, remote, generator),
            phase: Phase::Init,
            seq: 0,
            ack: 0,
            outstanding: false,
        }
    }

    /// The local endpoint of the conversation.
    pub fn local(&self) -> Endpoint {
        self.local
    }

    /// The remote endpoint of the conversation.
    pub fn remote(&self) -> Endpoint {
        self.remote
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The sequence number for the next outgoing segment.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The acknowledgment number for the next outgoing segment.
    pub fn ack(&self) -> u32 {
        self.ack
    }

    fn prefix(&self) -> [u8; SEQ_ACK_PREFIX_LEN] {
        let mut data = [0u8; SEQ_ACK_PREFIX_LEN];
        NetworkEndian::write_u32(&mut data[0..4], self.seq);
        NetworkEndian::write_u32(&mut data[4..8], self.ack);
        data
    }

    /// Build the opening SYN, moving `Init` to `SynSent`.
    pub fn open(&mut self) -> Result<Datagram, Error> {
        if self.phase != Phase::Init {
            return Err(Error::Phase(self.phase));
        }
        let syn = self.builder.build(Intent::Syn, &[])?;
        self.phase = Phase::SynSent;
        Ok(syn)
    }

    /// Build the data push, moving `EstablishedSendAck` to `Streaming`.
    ///
    /// Uses the seq/ack pair left by the handshake unchanged. The peer has
    /// already acknowledged past the SYN's virtual octet, so no further
    /// adjustment is applied before the payload goes out.
    pub fn push(&mut self, payload: &[u8]) -> Result<Datagram, Error> {
        if self.phase != Phase::EstablishedSendAck {
            return Err(Error::Phase(self.phase));
        }
        if payload.len() > DATAGRAM_LEN - SEQ_ACK_PREFIX_LEN {
            return Err(Error::Wire(wire::Error::Exhausted));
        }
        let mut data = [0u8; DATAGRAM_LEN];
        data[..SEQ_ACK_PREFIX_LEN].copy_from_slice(&self.prefix());
        data[SEQ_ACK_PREFIX_LEN..SEQ_ACK_PREFIX_LEN + payload.len()]
            .copy_from_slice(payload);
        let push = self.builder
            .build(Intent::Psh, &data[..SEQ_ACK_PREFIX_LEN + payload.len()])?;
        self.phase = Phase::Streaming;
        self.outstanding = true;
        Ok(push)
    }

    /// React to one received segment.
    ///
    /// Every received segment first rolls the seq/ack pair forward: the
    /// peer's acknowledgment becomes our sequence number and the peer's
    /// sequence number plus one becomes our acknowledgment.
    ///
    /// In `SynSent` or `WaitSynAck` the segment is taken as the SYN-ACK and
    /// answered with the handshake ACK. In `Streaming` a FIN is answered
    /// with our own FIN and ends the conversation; a PSH, or an ACK while
    /// our push is still unacknowledged, is answered with a bare ACK;
    /// anything else is ignored.
    pub fn handle(&mut self, received: &[u8]) -> Result<Reply, Error> {
        match self.phase {
            Phase::SynSent | Phase::WaitSynAck => {
                let (seq, ack) = datagram::update_seq_and_ack(received)?;
                self.seq = seq;
                self.ack = ack;
                let reply = self.builder.build(Intent::Ack, &self.prefix())?;
                self.phase = Phase::EstablishedSendAck;
                Ok(Reply::Send(reply))
            }
            Phase::Streaming => {
                let parsed = datagram::parse(received)?;
                let flags = parsed.tcp.flags;

                let (seq, ack) = datagram::update_seq_and_ack(received)?;
                self.seq = seq;
                self.ack = ack;

                let acknowledges = flags.ack() && self.outstanding;
                if flags.ack() {
                    self.outstanding = false;
                }

                if flags.fin() {
                    let fin = self.builder.build(Intent::Fin, &self.prefix())?;
                    self.phase = Phase::Closing;
                    Ok(Reply::Shutdown(fin))
                } else if flags.psh() || acknowledges {
                    let reply = self.builder.build(Intent::Ack, &self.prefix())?;
                    Ok(Reply::Send(reply))
                } else {
                    Ok(Reply::Quiet)
                }
            }
            phase => Err(Error::Phase(phase)),
        }
    }

    /// Mark the session torn down once the FIN has actually been sent.
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    fn transmit<T: Transport>(&self, transport: &mut T, datagram: &Datagram)
        -> Result<(), Error>
    {
        let sent = transport.send(datagram.as_bytes(), self.remote)?;
        if sent != datagram.len() {
            return Err(Error::ShortSend { sent, expected: datagram.len() });
        }
        Ok(())
    }

    /// Drive the whole conversation against a transport.
    ///
    /// Connects, pushes `payload` once and then reacts to the peer until it
    /// closes the connection. Blocks for as long as the transport blocks.
    pub fn run<T: Transport>(&mut self, transport: &mut T, payload: &[u8])
        -> Result<(), Error>
    {
        let syn = self.open()?;
        self.transmit(transport, &syn)?;

        let mut buffer = [0u8; DATAGRAM_LEN];
        self.phase = Phase::WaitSynAck;
        let received = transport.recv(&mut buffer, self.local.port)?;
        match self.handle(&buffer[..received])? {
            Reply::Send(ack) => self.transmit(transport, &ack)?,
            // Unreachable out of the handshake phases.
            Reply::Quiet | Reply::Shutdown(_) => return Err(Error::Phase(self.phase)),
        }

        let push = self.push(payload)?;
        self.transmit(transport, &push)?;

        loop {
            let received = transport.recv(&mut buffer, self.local.port)?;
            match self.handle(&buffer[..received])? {
                Reply::Quiet => (),
                Reply::Send(datagram) => self.transmit(transport, &datagram)?,
                Reply::Shutdown(datagram) => {
                    self.transmit(transport, &datagram)?;
                    self.close();
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use crate::wire::{
        ipv4_packet, tcp_segment,
        IpProtocol, Ipv4Address, Ipv4Repr, TcpFlags, TcpRepr};

    fn local() -> Endpoint {
        Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 4000)
    }

    fn remote() -> Endpoint {
        Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 80)
    }

    fn session() -> Session {
        Session::with_generator(local(), remote(), isn::Generator::from_secret_key(3, 5))
    }

    /// Emit a segment as the peer would send it, remote towards local.
    fn from_peer(flags: TcpFlags, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
        let tcp_repr = TcpRepr {
            src_port:       remote().port,
            dst_port:       local().port,
            seq_number:     seq,
            ack_number:     ack,
            flags,
            window_len:     4096,
            max_seg_size:   None,
            sack_permitted: false,
            payload_len:    payload.len(),
        };
        let ip_repr = Ipv4Repr {
            src_addr:    remote().addr,
            dst_addr:    local().addr,
            protocol:    IpProtocol::Tcp,
            payload_len: tcp_repr.buffer_len(),
            ident:       42,
            ttl:         64,
        };

        let mut bytes = vec![0u8; ip_repr.total_len()];
        let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
        ip_repr.emit(packet);
        let segment = tcp_segment::new_unchecked_mut(packet.payload_mut_slice());
        tcp_repr.emit(segment);
        segment.payload_mut_slice().copy_from_slice(payload);
        segment.fill_checksum(ip_repr.src_addr, ip_repr.dst_addr);
        packet.fill_checksum();
        bytes
    }

    fn syn_ack(seq: u32, ack: u32) -> Vec<u8> {
        let mut flags = TcpFlags::default();
        flags.set_syn(true);
        flags.set_ack(true);
        from_peer(flags, seq, ack, &[])
    }

    /// A transport fed from a script of incoming datagrams.
    struct Scripted {
        incoming: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl Scripted {
        fn new(incoming: Vec<Vec<u8>>) -> Scripted {
            Scripted {
                incoming: incoming.into(),
                sent: Vec::new(),
            }
        }

        fn sent_flags(&self) -> Vec<TcpFlags> {
            self.sent.iter()
                .map(|bytes| datagram::parse(bytes).unwrap().tcp.flags)
                .collect()
        }
    }

    impl Transport for Scripted {
        fn send(&mut self, datagram: &[u8], dst: Endpoint) -> Result<usize, Error> {
            assert_eq!(dst, remote());
            self.sent.push(datagram.to_vec());
            Ok(datagram.len())
        }

        fn recv(&mut self, buffer: &mut [u8], local_port: u16) -> Result<usize, Error> {
            assert_eq!(local_port, local().port);
            let next = self.incoming.pop_front()
                .ok_or(Error::Transport(libc_eof_code()))?;
            buffer[..next.len()].copy_from_slice(&next);
            Ok(next.len())
        }
    }

    fn libc_eof_code() -> i32 {
        // Stands in for whatever errno a dried-up transport reports.
        104
    }

    #[test]
    fn handshake_updates_the_pair() {
        let mut session = session();
        let syn = session.open().unwrap();
        assert_eq!(session.phase(), Phase::SynSent);
        assert!(datagram::parse(syn.as_bytes()).unwrap().tcp.flags.syn());

        let reply = session.handle(&syn_ack(1000, 501)).unwrap();
        assert_eq!((session.seq(), session.ack()), (501, 1001));
        assert_eq!(session.phase(), Phase::EstablishedSendAck);

        let ack = match reply {
            Reply::Send(datagram) => datagram,
            other => panic!("expected a handshake ack, got {:?}", other),
        };
        let parsed = datagram::parse(ack.as_bytes()).unwrap();
        assert_eq!(parsed.tcp.seq_number, 501);
        assert_eq!(parsed.tcp.ack_number, 1001);
        assert!(parsed.tcp.flags.ack());
        assert!(!parsed.tcp.flags.syn());
    }

    #[test]
    fn push_keeps_the_handshake_pair() {
        let mut session = session();
        session.open().unwrap();
        session.handle(&syn_ack(1000, 501)).unwrap();

        let push = session.push(b"TEST TEST.").unwrap();
        assert_eq!(session.phase(), Phase::Streaming);

        let parsed = datagram::parse(push.as_bytes()).unwrap();
        assert_eq!(parsed.tcp.seq_number, 501);
        assert_eq!(parsed.tcp.ack_number, 1001);
        assert!(parsed.tcp.flags.psh());
        assert!(parsed.tcp.flags.ack());
        assert_eq!(parsed.payload, b"TEST TEST.");
    }

    #[test]
    fn fin_produces_exactly_one_fin() {
        let mut session = session();
        session.open().unwrap();
        session.handle(&syn_ack(1000, 501)).unwrap();
        session.push(b"x").unwrap();

        let mut fin_flags = TcpFlags::default();
        fin_flags.set_fin(true);
        fin_flags.set_ack(true);
        let reply = session.handle(&from_peer(fin_flags, 1001, 502, &[])).unwrap();
        assert_eq!(session.phase(), Phase::Closing);

        let fin = match reply {
            Reply::Shutdown(datagram) => datagram,
            other => panic!("expected a shutdown, got {:?}", other),
        };
        let parsed = datagram::parse(fin.as_bytes()).unwrap();
        assert!(parsed.tcp.flags.fin());
        assert!(parsed.tcp.flags.ack());
        assert_eq!(parsed.tcp.seq_number, 502);
        assert_eq!(parsed.tcp.ack_number, 1002);

        session.close();
        assert_eq!(session.phase(), Phase::Closed);
    }

    #[test]
    fn psh_from_peer_is_acknowledged() {
        let mut session = session();
        session.open().unwrap();
        session.handle(&syn_ack(1000, 501)).unwrap();
        session.push(b"x").unwrap();

        let mut flags = TcpFlags::default();
        flags.set_psh(true);
        flags.set_ack(true);
        let reply = session.handle(&from_peer(flags, 1001, 502, b"pong")).unwrap();
        match reply {
            Reply::Send(datagram) => {
                let parsed = datagram::parse(datagram.as_bytes()).unwrap();
                assert_eq!(parsed.tcp.flags.ack(), true);
                assert_eq!(parsed.tcp.flags.psh(), false);
            }
            other => panic!("expected an ack, got {:?}", other),
        }
        assert_eq!(session.phase(), Phase::Streaming);
    }

    #[test]
    fn bare_ack_after_settled_push_is_quiet() {
        let mut session = session();
        session.open().unwrap();
        session.handle(&syn_ack(1000, 501)).unwrap();
        session.push(b"x").unwrap();

        let mut flags = TcpFlags::default();
        flags.set_ack(true);
        // First ack settles the outstanding push and is answered.
        match session.handle(&from_peer(flags, 1001, 502, &[])).unwrap() {
            Reply::Send(_) => (),
            other => panic!("expected an ack, got {:?}", other),
        }
        // A second bare ack has nothing left to settle.
        match session.handle(&from_peer(flags, 1001, 502, &[])).unwrap() {
            Reply::Quiet => (),
            other => panic!("expected quiet, got {:?}", other),
        }
    }

    #[test]
    fn out_of_phase_operations_are_rejected() {
        let mut session = session();
        assert_eq!(session.push(b"x").err(), Some(Error::Phase(Phase::Init)));
        assert_eq!(session.handle(&[]).err(), Some(Error::Phase(Phase::Init)));

        session.open().unwrap();
        assert_eq!(session.open().err(), Some(Error::Phase(Phase::SynSent)));
    }

    #[test]
    fn run_completes_a_full_conversation() {
        let mut server_flags = TcpFlags::default();
        server_flags.set_ack(true);
        let mut fin_flags = TcpFlags::default();
        fin_flags.set_fin(true);
        fin_flags.set_ack(true);

        let mut transport = Scripted::new(vec![
            syn_ack(1000, 501),
            from_peer(server_flags, 1001, 502, &[]),
            from_peer(fin_flags, 1001, 503, &[]),
        ]);

        let mut session = session();
        session.run(&mut transport, b"TEST TEST.").unwrap();
        assert_eq!(session.phase(), Phase::Closed);

        let flags = transport.sent_flags();
        assert_eq!(flags.len(), 5);
        assert!(flags[0].syn());
        assert!(flags[1].ack() && !flags[1].psh());
        assert!(flags[2].psh());
        assert!(flags[3].ack() && !flags[3].fin());
        assert!(flags[4].fin());
    }

    #[test]
    fn transport_failure_is_fatal() {
        // No scripted reply to the syn at all.
        let mut transport = Scripted::new(vec![]);
        let mut session = session();
        assert_eq!(session.run(&mut transport, b"x").err(),
                   Some(Error::Transport(libc_eof_code())));
    }
}
