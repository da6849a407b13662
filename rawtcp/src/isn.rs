//! Fresh initial sequence numbers and fragment identifiers.
//!
//! Every session needs two kinds of unpredictable values: the initial TCP
//! sequence number and the IP fragment identification of each outgoing
//! datagram. Both come from a single keyed generator so that a process never
//! reuses the sequence space of a previous run.

/// A generator for initial sequence numbers and fragment identifiers.
///
/// The key material is absorbed once at construction; afterwards every call
/// advances an internal counter and scrambles it with the SplitMix64
/// finalizer. This is not a cryptographic guarantee against an attacker who
/// observes many outputs, but it is unpredictable across process runs, which
/// is the property the session layer needs.
#[derive(Debug, Clone)]
pub struct Generator {
    state: u64,
    increment: u64,
}

impl Generator {
    /// Create a generator by deriving a key from the standard `RandomState`.
    ///
    /// This is done by individually hashing the numbers `0u64` and `1u64`
    /// each with the same hasher created from a new instance of
    /// `RandomState`. The two output tags become the seed and the stream
    /// increment.
    #[cfg(feature = "std")]
    pub fn from_std_hash() -> Self {
        use std::hash::{Hasher, BuildHasher};
        use std::collections::hash_map::RandomState;

        let hash = RandomState::new().build_hasher();
        let x0 = {
            let mut hash = hash.clone();
            hash.write_u64(0);
            hash.finish()
        };
        let x1 = {
            let mut hash = hash.clone();
            hash.write_u64(1);
            hash.finish()
        };

        Generator::from_secret_key(x0, x1)
    }

    /// Create a generator with a pre-defined secret key.
    ///
    /// Really, create the key with some cryptographic random means or derive
    /// it from some other key with a key derivation function. Mostly useful
    /// for deterministic tests and `no_std` callers that bring their own
    /// entropy.
    pub const fn from_secret_key(seed: u64, stream: u64) -> Self {
        // The increment must be odd for the counter to cycle through the
        // full 2^64 states.
        Generator {
            state: seed,
            increment: stream | 1,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(self.increment);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Draw a fresh initial sequence number.
    pub fn next_isn(&mut self) -> u32 {
        self.next_u64() as u32
    }

    /// Draw a fresh IP fragment identification.
    pub fn next_ident(&mut self) -> u16 {
        self.next_u64() as u16
    }
}
