use core::fmt;

/// The error type for parsing and assembly of datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming packet could not be parsed because it was shorter than assumed.
    ///
    /// The packet may be shorter than the minimum length specified, or some of
    /// its fields may be out of bounds of the received data.
    Truncated,

    /// An incoming packet had an incorrect checksum and was dropped.
    WrongChecksum,

    /// An incoming packet could not be recognized and was dropped.
    ///
    /// E.g. an Ethernet frame with an unknown EtherType, or an ARP packet for
    /// a hardware/protocol pair other than Ethernet and IPv4.
    Unrecognized,

    /// An incoming packet was recognized but was self-contradictory.
    ///
    /// The canonical case here is a datagram whose declared IP and TCP header
    /// lengths together exceed the physical length of the received buffer;
    /// treating such a datagram as valid would produce a negative payload
    /// length.
    Malformed,

    /// A payload did not fit the fixed-capacity datagram buffer.
    Exhausted,
}

/// The result type for wire operations.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Unrecognized  => write!(f, "unrecognized packet"),
            Error::Malformed     => write!(f, "malformed packet"),
            Error::Exhausted     => write!(f, "buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
