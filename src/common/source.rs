//! Byte sources a compound document can be read from.
//!
//! The document reader only needs absolute seeks and exact reads, so any
//! `Read + Seek` type qualifies as a [`ByteSource`]: a [`std::fs::File`], a
//! [`std::io::Cursor`] over an in-memory buffer, or a caller-supplied stream.
//! Plain, forward-only readers can be adapted with [`MemoryCacheSource`].

use std::io::{self, Read, Seek, SeekFrom};

use crate::ole::consts::MAGIC;

/// A seekable, random-access byte source.
pub trait ByteSource: Read + Seek {}

impl<T: Read + Seek + ?Sized> ByteSource for T {}

/// Chunk size used when pulling bytes from the wrapped reader.
const FILL_CHUNK: usize = 8192;

/// Seekable adapter over a forward-only reader.
///
/// Every byte pulled from the inner reader is kept in memory, so positions
/// already read can be revisited. Seeking forward reads (and caches) the
/// intervening bytes; seeking relative to the end drains the reader.
#[derive(Debug)]
pub struct MemoryCacheSource<R> {
    inner: R,
    cache: Vec<u8>,
    position: u64,
    exhausted: bool,
}

impl<R: Read> MemoryCacheSource<R> {
    /// Wrap `inner`; nothing is read until the first access.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Vec::new(),
            position: 0,
            exhausted: false,
        }
    }

    /// Number of bytes cached so far.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Give back the wrapped reader. Cached bytes are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Make sure the cache covers `[0, end)`, or as much as the reader has.
    fn fill_to(&mut self, end: u64) -> io::Result<()> {
        let mut chunk = [0u8; FILL_CHUNK];
        while !self.exhausted && (self.cache.len() as u64) < end {
            let n = match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                },
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.cache.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn fill_all(&mut self) -> io::Result<()> {
        self.fill_to(u64::MAX)
    }
}

impl<R: Read> Read for MemoryCacheSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.fill_to(self.position.saturating_add(buf.len() as u64))?;

        let start = self.position.min(self.cache.len() as u64) as usize;
        let n = buf.len().min(self.cache.len() - start);
        buf[..n].copy_from_slice(&self.cache[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read> Seek for MemoryCacheSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                self.fill_all()?;
                (self.cache.len() as u64).checked_add_signed(delta)
            },
        };

        match target {
            Some(target) => {
                self.position = target;
                Ok(target)
            },
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

/// Check whether `source` starts with the compound document magic.
///
/// The source position is restored afterwards, whatever the outcome.
pub fn is_compound_document<S: Read + Seek + ?Sized>(source: &mut S) -> io::Result<bool> {
    let start = source.stream_position()?;
    let mut magic = [0u8; 8];
    let matched = match source.read_exact(&mut magic) {
        Ok(()) => &magic == MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => {
            source.seek(SeekFrom::Start(start))?;
            return Err(e);
        },
    };
    source.seek(SeekFrom::Start(start))?;
    Ok(matched)
}

/// Check whether `data` starts with the compound document magic.
pub fn is_compound_document_bytes(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}
