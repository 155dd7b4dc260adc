//! Reading entry contents through their sector chains.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use once_cell::unsync::OnceCell;

use super::document::CompoundDocument;
use super::header::sector_offset;
use crate::common::error::{Error, Result};

/// A seekable stream over the contents of one stream entry.
///
/// Streams below the document's mini stream cutoff are read through the SSAT
/// from the mini stream, larger ones through the SAT from standard sectors.
/// The sector chain is walked once, on first access, and cached for the life
/// of the stream, so seeking never re-walks it.
///
/// Positions can be remembered with [`mark`](Self::mark) and restored with
/// [`reset`](Self::reset); marks nest.
pub struct EntryStream<'a, R> {
    doc: &'a CompoundDocument<R>,
    start: u32,
    len: u64,
    mini: bool,
    /// Sector or mini sector size
    unit: usize,
    chain: OnceCell<Vec<u32>>,
    pos: u64,
    buffer: Vec<u8>,
    /// Chain index whose bytes are in `buffer`
    buffered: Option<usize>,
    marks: Vec<u64>,
}

impl<'a, R: Read + Seek> EntryStream<'a, R> {
    pub(crate) fn new(doc: &'a CompoundDocument<R>, start: u32, len: u64) -> Self {
        let header = doc.header();
        let mini = header.is_mini_stream(len);
        let unit = if mini {
            header.mini_sector_size()
        } else {
            header.sector_size()
        };

        Self {
            doc,
            start,
            len,
            mini,
            unit,
            chain: OnceCell::new(),
            pos: 0,
            buffer: Vec::new(),
            buffered: None,
            marks: Vec::new(),
        }
    }

    /// Total length of the stream in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the end of the stream.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }

    /// Whether the stream lives in the mini stream.
    #[inline]
    pub fn is_mini(&self) -> bool {
        self.mini
    }

    /// Advance by up to `n` bytes, never past the end of the stream.
    ///
    /// Returns the number of bytes actually skipped.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let skipped = n.min(self.remaining());
        self.pos += skipped;
        Ok(skipped)
    }

    /// Remember the current position.
    pub fn mark(&mut self) {
        self.marks.push(self.pos);
    }

    /// Return to the most recent mark, or to the start without one.
    pub fn reset(&mut self) {
        self.pos = self.marks.pop().unwrap_or(0);
    }

    /// Sector ids of the stream, materialized on first use.
    fn sector_chain(&self) -> Result<&[u32]> {
        let chain = self.chain.get_or_try_init(|| {
            let needed = self.len.div_ceil(self.unit as u64) as usize;
            let table = if self.mini {
                self.doc.ssat()
            } else {
                self.doc.sat()
            };
            let chain = table.chain_prefix(self.start, needed)?;
            tracing::trace!(
                start = self.start,
                sectors = chain.len(),
                mini = self.mini,
                "stream chain materialized"
            );
            Ok::<_, Error>(chain)
        })?;
        Ok(chain)
    }

    /// Load the sector at chain `index` into the buffer.
    fn fill(&mut self, index: usize) -> Result<()> {
        if self.buffered == Some(index) {
            return Ok(());
        }

        let chain = self.sector_chain()?;
        let sid = chain.get(index).copied().ok_or(Error::TruncatedChain {
            needed: self.len.div_ceil(self.unit as u64),
            available: chain.len(),
        })?;

        let offset = if self.mini {
            self.doc.mini_sector_offset(sid)?
        } else {
            sector_offset(self.unit, sid)
        };

        // The last sector of a file may be cut short; read only what the stream uses
        let sector_start = index as u64 * self.unit as u64;
        let wanted = (self.len - sector_start).min(self.unit as u64) as usize;
        self.buffer.resize(wanted, 0);
        self.buffered = None;
        self.doc.read_at(offset, &mut self.buffer)?;
        self.buffered = Some(index);
        Ok(())
    }
}

impl<R: Read + Seek> Read for EntryStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }

        let index = (self.pos / self.unit as u64) as usize;
        let within = (self.pos % self.unit as u64) as usize;
        self.fill(index)?;

        let n = (self.buffer.len() - within).min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[within..within + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for EntryStream<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
        };

        match target {
            Some(target) if target <= self.len => {
                self.pos = target;
                Ok(target)
            },
            Some(target) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {} past end of stream ({} bytes)", target, self.len),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

impl<R> fmt::Debug for EntryStream<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStream")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("mini", &self.mini)
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ole::consts::ENDOFCHAIN;
    use crate::ole::testing::{DocumentBuilder, put_u32};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_mini_and_standard_selection() {
        let doc = CompoundDocument::from_bytes(
            DocumentBuilder::new()
                .stream(&["small"], &pattern(100))
                .stream(&["large"], &pattern(5000))
                .build(),
        )
        .unwrap();
        let root = doc.root_entry();

        let small = root.child_entry("small").unwrap().input_stream().unwrap().unwrap();
        assert!(small.is_mini());
        let large = root.child_entry("large").unwrap().input_stream().unwrap().unwrap();
        assert!(!large.is_mini());
        assert_eq!(large.len(), 5000);
    }

    #[test]
    fn test_read_crosses_sectors() {
        let data = pattern(3000);
        let doc = CompoundDocument::from_bytes(
            DocumentBuilder::new().stream(&["data"], &data).build(),
        )
        .unwrap();
        let mut stream = doc
            .root_entry()
            .child_entry("data")
            .unwrap()
            .input_stream()
            .unwrap()
            .unwrap();

        let mut first = [0u8; 70];
        stream.read_exact(&mut first).unwrap();
        assert_eq!(&first[..], &data[..70]);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(&rest[..], &data[70..]);
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.read(&mut first).unwrap(), 0);
    }

    #[test]
    fn test_seek_and_skip() {
        let data = pattern(6000);
        let doc = CompoundDocument::from_bytes(
            DocumentBuilder::new().stream(&["data"], &data).build(),
        )
        .unwrap();
        let mut stream = doc
            .root_entry()
            .child_entry("data")
            .unwrap()
            .input_stream()
            .unwrap()
            .unwrap();

        assert_eq!(stream.skip(10).unwrap(), 10);
        assert_eq!(stream.position(), 10);

        stream.seek(SeekFrom::Start(4500)).unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[4500..4504]);

        // Backwards seek reuses the cached chain
        stream.seek(SeekFrom::Current(-4004)).unwrap();
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[500..504]);

        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), 6000);
        assert_eq!(stream.skip(1).unwrap(), 0);
        assert!(stream.seek(SeekFrom::Start(6001)).is_err());
        assert!(stream.seek(SeekFrom::Current(-7000)).is_err());
        assert_eq!(stream.position(), 6000);

        stream.seek(SeekFrom::Start(5990)).unwrap();
        assert_eq!(stream.skip(100).unwrap(), 10);
    }

    #[test]
    fn test_mark_reset_stack() {
        let data = pattern(200);
        let doc = CompoundDocument::from_bytes(
            DocumentBuilder::new().stream(&["data"], &data).build(),
        )
        .unwrap();
        let mut stream = doc
            .root_entry()
            .child_entry("data")
            .unwrap()
            .input_stream()
            .unwrap()
            .unwrap();

        stream.skip(5).unwrap();
        stream.mark();
        stream.skip(20).unwrap();
        stream.mark();
        stream.skip(50).unwrap();

        stream.reset();
        assert_eq!(stream.position(), 25);
        stream.reset();
        assert_eq!(stream.position(), 5);
        stream.reset();
        assert_eq!(stream.position(), 0);

        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], data[0]);
    }

    #[test]
    fn test_truncated_chain_surfaces_as_invalid_data() {
        let mut bytes = DocumentBuilder::new().stream(&["data"], &pattern(5000)).build();
        let doc = CompoundDocument::from_bytes(bytes.clone()).unwrap();
        let start = doc.root_entry().child_entry("data").unwrap().start_sector();
        drop(doc);

        // End the chain right after its first sector (SAT sector 0 holds the entry)
        put_u32(&mut bytes, 512 + start as usize * 4, ENDOFCHAIN);
        let doc = CompoundDocument::from_bytes(bytes).unwrap();
        let mut stream = doc
            .root_entry()
            .child_entry("data")
            .unwrap()
            .input_stream()
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(out.len(), 512);
    }
}
