//! The read-only compound document facade.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use super::directory::{Directory, DirectoryRecord};
use super::entry::Entry;
use super::header::{Header, sector_offset};
use super::options::OpenOptions;
use super::sat::AllocationTable;
use crate::common::error::{Error, Result};
use crate::common::source::MemoryCacheSource;

/// A compound document opened for reading.
///
/// Opening parses the header, both allocation tables and the whole directory
/// up front; stream contents are only read when an [`EntryStream`](super::EntryStream)
/// asks for them. All streams of a document share its byte source, so a
/// document is not `Sync`.
///
/// # Examples
///
/// ```no_run
/// use std::io::Read;
/// use litchi_cfb::ole::CompoundDocument;
///
/// let doc = CompoundDocument::open_path("Thumbs.db")?;
/// for entry in doc.root_entry().child_entries() {
///     println!("{}: {} bytes", entry.name(), entry.len());
/// }
///
/// if let Some(catalog) = doc.root_entry().child_entry("Catalog") {
///     let mut data = Vec::new();
///     if let Some(mut stream) = catalog.input_stream()? {
///         stream.read_to_end(&mut data)?;
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct CompoundDocument<R> {
    source: RefCell<R>,
    owns_source: bool,
    header: Header,
    sat: AllocationTable,
    ssat: AllocationTable,
    directory: Directory,
    /// Standard sectors holding the mini stream, in order
    mini_stream_chain: Vec<u32>,
    file_len: u64,
}

impl CompoundDocument<File> {
    /// Open the compound document stored at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_path_with(path, OpenOptions::default())
    }

    /// Open the compound document stored at `path` with custom options.
    ///
    /// The file is always owned by the document.
    pub fn open_path_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::open_with(file, options.with_owns_source(true))
    }
}

impl CompoundDocument<Cursor<Bytes>> {
    /// Open a compound document held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::open_with(
            Cursor::new(bytes.into()),
            OpenOptions::new().with_owns_source(true),
        )
    }
}

impl<R: Read> CompoundDocument<MemoryCacheSource<R>> {
    /// Open a compound document from a forward-only reader.
    ///
    /// The bytes are cached in memory as they are read. The caller keeps
    /// ownership of `reader`: [`close`](Self::close) hands the wrapper back.
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::open(MemoryCacheSource::new(reader))
    }
}

impl<R: Read + Seek> CompoundDocument<R> {
    /// Open a compound document from a seekable source the caller keeps owning.
    pub fn open(source: R) -> Result<Self> {
        Self::open_with(source, OpenOptions::default())
    }

    /// Open a compound document with custom options.
    pub fn open_with(mut source: R, options: OpenOptions) -> Result<Self> {
        let file_len = source.seek(SeekFrom::End(0))?;

        let header = Header::parse(&mut source, file_len, &options)?;
        let sector_limit = header.sector_limit(file_len);
        let sat = AllocationTable::build_sat(&mut source, &header, sector_limit)?;
        let directory = Directory::read(&mut source, &header, &sat, &options)?;

        // The mini stream is the root entry's own stream
        let root = directory.root();
        let mini_stream_chain = sat.chain(root.start_sector)?;
        let chain_bytes = mini_stream_chain.len() as u64 * header.sector_size() as u64;
        if chain_bytes < root.size {
            tracing::warn!(
                declared = root.size,
                available = chain_bytes,
                "mini stream chain shorter than the root entry size"
            );
        }
        // Mini sectors may address the whole chain, not only the declared size
        let mini_sector_limit =
            (chain_bytes / header.mini_sector_size() as u64).min(u32::MAX as u64) as u32;
        let ssat = AllocationTable::build_ssat(&mut source, &header, &sat, mini_sector_limit)?;

        tracing::debug!(
            version = header.major_version,
            sector_size = header.sector_size(),
            mini_sector_size = header.mini_sector_size(),
            sat_entries = sat.len(),
            ssat_entries = ssat.len(),
            directory_entries = directory.len(),
            "compound document opened"
        );

        Ok(Self {
            source: RefCell::new(source),
            owns_source: options.owns_source,
            header,
            sat,
            ssat,
            directory,
            mini_stream_chain,
            file_len,
        })
    }

    /// The root storage.
    pub fn root_entry(&self) -> Entry<'_, R> {
        Entry::new(self, 0)
    }

    /// The entry with directory id `did`.
    pub fn entry(&self, did: u32) -> Result<Entry<'_, R>> {
        if (did as usize) < self.directory.len() {
            Ok(Entry::new(self, did))
        } else {
            Err(Error::DirectoryIdOutOfRange {
                did,
                count: self.directory.len(),
            })
        }
    }

    /// Look up an entry by absolute path, such as `/ObjectPool/_1234/Ole`.
    ///
    /// `/` is the root entry. Components are matched exactly. Returns
    /// `Ok(None)` when a component does not exist.
    pub fn entry_by_path(&self, path: &str) -> Result<Option<Entry<'_, R>>> {
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(path.to_string()));
        }

        let mut current = self.root_entry();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.kind().has_children() {
                return Err(Error::NotAStorage(current.name().to_string()));
            }
            match current.child_entry(component) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Close the document.
    ///
    /// Returns the byte source when the document does not own it; an owned
    /// source is dropped.
    pub fn close(self) -> Option<R> {
        let source = self.source.into_inner();
        if self.owns_source {
            None
        } else {
            Some(source)
        }
    }

    /// Read exactly `buf.len()` bytes at absolute `offset`.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut source = self.source.borrow_mut();
        source.seek(SeekFrom::Start(offset))?;
        source.read_exact(buf)
    }
}

impl<R> CompoundDocument<R> {
    /// The parsed header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether the document owns its byte source.
    #[inline]
    pub fn owns_source(&self) -> bool {
        self.owns_source
    }

    /// Length of the byte source.
    #[inline]
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Number of directory records, including unused slots.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.directory.len()
    }

    #[inline]
    pub(crate) fn sat(&self) -> &AllocationTable {
        &self.sat
    }

    #[inline]
    pub(crate) fn ssat(&self) -> &AllocationTable {
        &self.ssat
    }

    #[inline]
    pub(crate) fn directory(&self) -> &Directory {
        &self.directory
    }

    #[inline]
    pub(crate) fn record(&self, did: u32) -> &DirectoryRecord {
        &self.directory.records()[did as usize]
    }

    /// Absolute byte offset of mini sector `sid`.
    pub(crate) fn mini_sector_offset(&self, sid: u32) -> Result<u64> {
        let sector_size = self.header.sector_size() as u64;
        let offset = sid as u64 * self.header.mini_sector_size() as u64;
        let index = offset / sector_size;

        let sector = self
            .mini_stream_chain
            .get(index as usize)
            .copied()
            .ok_or(Error::TruncatedChain {
                needed: index + 1,
                available: self.mini_stream_chain.len(),
            })?;
        Ok(sector_offset(sector_size as usize, sector) + offset % sector_size)
    }
}

impl<R> fmt::Display for CompoundDocument<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = self.header.class_id_string();
        write!(
            f,
            "CompoundDocument[uuid: {}, sector size: {}/{} bytes, directory SID: {}, master SAT: {} entries]",
            if uuid.is_empty() { "-" } else { uuid.as_str() },
            self.header.sector_size(),
            self.header.mini_sector_size(),
            self.header.directory_start,
            self.header.sat_sectors.len()
        )
    }
}
