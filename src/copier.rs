//! Moving bytes from a source to a destination in fixed-size chunks.

use std::{
    fs::File,
    io::{self, Read, Write},
    num::NonZeroUsize,
    time::{Duration, Instant},
};
use tracing::{debug, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Matches the block size most devices are happy with for sequential I/O.
pub(crate) const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// A write destination that can be forced out to the device.
pub(crate) trait Durable: Write {
    /// Blocks until everything written so far has been handed to the device.
    fn sync(&mut self) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// What a single copy moved, and how long it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub bytes: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkCopier {
    chunk_size: NonZeroUsize,
}

impl ChunkCopier {
    pub(crate) fn new(chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size }
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    /// Copies exactly `total_bytes` from `src` to `dst`, one chunk per
    /// read/write pair; the final chunk may be short.
    ///
    /// The destination is synced before the clock stops, so the elapsed
    /// time includes getting the data onto the device. A source that runs
    /// dry early yields [io::ErrorKind::UnexpectedEof].
    pub(crate) fn copy(
        &self,
        src: &mut impl Read,
        dst: &mut impl Durable,
        total_bytes: u64,
    ) -> io::Result<Transfer> {
        let buf_len = self
            .chunk_size
            .get()
            .min(usize::try_from(total_bytes).unwrap_or(usize::MAX));
        let mut buf = vec![0; buf_len];
        let start = Instant::now();

        let mut done = 0u64;
        while done < total_bytes {
            let len = (total_bytes - done).min(buf.len() as u64) as usize;
            let chunk = &mut buf[..len];
            src.read_exact(chunk).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("source ran out after {done} of {total_bytes} bytes"),
                    )
                } else {
                    e
                }
            })?;
            dst.write_all(chunk)?;
            done += len as u64;
            Span::current().pb_inc(len as u64);
        }
        dst.flush()?;
        dst.sync()?;

        let elapsed = start.elapsed();
        debug!(bytes = done, ?elapsed, "copy complete");
        Ok(Transfer {
            bytes: done,
            elapsed,
        })
    }
}
