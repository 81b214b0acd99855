//! Routines for generating an infinite amount of zeroes or garbage.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::io;

/// The kind of content a write phase puts on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataSource {
    /// Every byte is 0x00.
    Zero,
    /// Uniformly distributed bytes from a fast, non-cryptographic PRNG.
    Random,
}

impl DataSource {
    /// Constructs a fresh generator of this kind, limited to `len` bytes.
    ///
    /// Generators cannot be rewound; call this again to start over.
    pub(crate) fn reader(self, len: u64) -> io::Take<Generator> {
        let generator = match self {
            DataSource::Zero => Generator::Zero,
            DataSource::Random => Generator::Random(Box::new(ChaCha8Rng::from_entropy())),
        };
        io::Read::take(generator, len)
    }
}

/// An endless byte stream. Use [DataSource::reader] to get a bounded one.
pub(crate) enum Generator {
    Zero,
    Random(Box<ChaCha8Rng>),
}

/// Generator implements Read in order to supply the write phases with
/// data that can be copied to disk. Reads never fail and never hit EOF.
impl io::Read for Generator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Generator::Zero => buf.fill(0),
            Generator::Random(rng) => rng.fill_bytes(buf),
        }
        Ok(buf.len())
    }
}
