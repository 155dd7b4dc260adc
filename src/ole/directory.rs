//! Directory stream parsing and entry tree reconstruction.
//!
//! The directory is a flat array of 128-byte records indexed by directory id
//! (DID); record 0 is always the root storage. Each storage's children form
//! a binary search tree threaded through the `left`/`right` fields of the
//! records, with the storage's `child` field pointing at the tree's root.
//!
//! ## Ordering
//!
//! Siblings are ordered the way the format defines:
//!
//! 1. **Shorter names first** (length in UTF-16 code units)
//! 2. **Then case-insensitive ordinal comparison** for same-length names
//!
//! Example ordering: `"9"` < `"01"` < `"Data"` < `"1Table"` < `"WordDocument"`.
//!
//! ## Tree reconstruction
//!
//! Trees are rebuilt once, when the directory is read, using an iterative
//! in-order walk with an explicit stack. Every DID may be placed in the tree
//! only once; seeing one again means the links form a cycle (or share a
//! subtree), and the directory is rejected with [`Error::CyclicDirectory`].
//! The resulting child lists are immutable sorted snapshots.

use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Seek};

use fixedbitset::FixedBitSet;
use smallvec::SmallVec;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use super::consts::*;
use super::header::{Header, read_sector};
use super::options::OpenOptions;
use super::sat::AllocationTable;
use crate::common::binary::decode_utf16le;
use crate::common::error::{Error, Result};

/// Raw directory entry structure (128 bytes)
///
/// This represents the on-disk format of a directory entry.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes (including null terminator)
    name_len: U16<LE>,
    /// Entry type (1 = storage, 2 = stream, 5 = root)
    entry_type: u8,
    /// Node color (0 = red, 1 = black)
    node_color: u8,
    /// Left sibling DID
    sid_left: U32<LE>,
    /// Right sibling DID
    sid_right: U32<LE>,
    /// Child DID
    sid_child: U32<LE>,
    /// CLSID (16 bytes)
    clsid: [u8; 16],
    /// State bits
    state_bits: U32<LE>,
    /// Creation time (FILETIME)
    creation_time: U64<LE>,
    /// Modified time (FILETIME)
    modified_time: U64<LE>,
    /// Starting sector
    start_sector: U32<LE>,
    /// Stream size (only the low 32 bits are meaningful for version 3)
    stream_size: U64<LE>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Unused directory slot
    Empty,
    /// Storage (directory)
    Storage,
    /// Stream (file)
    Stream,
    /// ILockBytes object
    LockBytes,
    /// IPropertyStorage object
    Property,
    /// The root storage
    Root,
    /// Type byte not defined by the format
    Unknown(u8),
}

impl EntryKind {
    /// Map the on-disk type byte.
    pub fn from_raw(value: u8) -> Self {
        match value {
            STGTY_EMPTY => EntryKind::Empty,
            STGTY_STORAGE => EntryKind::Storage,
            STGTY_STREAM => EntryKind::Stream,
            STGTY_LOCKBYTES => EntryKind::LockBytes,
            STGTY_PROPERTY => EntryKind::Property,
            STGTY_ROOT => EntryKind::Root,
            other => EntryKind::Unknown(other),
        }
    }

    /// The on-disk type byte.
    pub fn as_raw(self) -> u8 {
        match self {
            EntryKind::Empty => STGTY_EMPTY,
            EntryKind::Storage => STGTY_STORAGE,
            EntryKind::Stream => STGTY_STREAM,
            EntryKind::LockBytes => STGTY_LOCKBYTES,
            EntryKind::Property => STGTY_PROPERTY,
            EntryKind::Root => STGTY_ROOT,
            EntryKind::Unknown(other) => other,
        }
    }

    /// Whether entries of this kind can have children.
    #[inline]
    pub fn has_children(self) -> bool {
        matches!(self, EntryKind::Storage | EntryKind::Root)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Empty => f.write_str("empty"),
            EntryKind::Storage => f.write_str("storage"),
            EntryKind::Stream => f.write_str("stream"),
            EntryKind::LockBytes => f.write_str("lockbytes"),
            EntryKind::Property => f.write_str("property"),
            EntryKind::Root => f.write_str("root"),
            EntryKind::Unknown(value) => write!(f, "unknown({})", value),
        }
    }
}

/// One parsed directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Directory id (index in the directory)
    pub did: u32,
    /// Entry name (UTF-16 decoded)
    pub name: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Red-black tree node color
    pub node_color: u8,
    /// Left sibling DID
    pub left: u32,
    /// Right sibling DID
    pub right: u32,
    /// Root DID of the child tree
    pub child: u32,
    /// Class id
    pub class_id: [u8; 16],
    /// User flags
    pub state_bits: u32,
    /// Creation FILETIME, 0 when unset
    pub created: u64,
    /// Modification FILETIME, 0 when unset
    pub modified: u64,
    /// First sector (or mini sector) of the stream
    pub start_sector: u32,
    /// Stream size in bytes
    pub size: u64,
}

impl DirectoryRecord {
    /// Parse a single directory record from 128 bytes.
    pub fn parse(data: &[u8], did: u32, sector_size: usize) -> Result<Self> {
        let raw = RawDirectoryEntry::read_from_bytes(data)
            .map_err(|_| Error::InvalidFormat("Failed to parse directory entry".to_string()))?;

        // The length counts the terminating NUL; keep whole code units only
        let name_len = (raw.name_len.get() as usize).saturating_sub(2).min(64) & !1;
        let name = decode_utf16le(&raw.name[..name_len]);

        let kind = EntryKind::from_raw(raw.entry_type);
        if let EntryKind::Unknown(value) = kind {
            tracing::warn!(did, entry_type = value, "unknown directory entry type");
        }

        // 512-byte sector files only use the low 32 bits
        let size = if sector_size == SECTOR_SIZE_V3 {
            raw.stream_size.get() & 0xFFFF_FFFF
        } else {
            raw.stream_size.get()
        };

        Ok(Self {
            did,
            name,
            kind,
            node_color: raw.node_color,
            left: raw.sid_left.get(),
            right: raw.sid_right.get(),
            child: raw.sid_child.get(),
            class_id: raw.clsid,
            state_bits: raw.state_bits.get(),
            created: raw.creation_time.get(),
            modified: raw.modified_time.get(),
            start_sector: raw.start_sector.get(),
            size,
        })
    }
}

/// Compare two entry names using the directory ordering.
///
/// Shorter names sort first; names of equal length compare case-insensitively,
/// code unit by code unit.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use litchi_cfb::ole::compare_names;
///
/// assert_eq!(compare_names("Data", "1Table"), Ordering::Less);
/// assert_eq!(compare_names("abc", "ABD"), Ordering::Less);
/// assert_eq!(compare_names("Catalog", "CATALOG"), Ordering::Equal);
/// ```
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let len_a = a.encode_utf16().count();
    let len_b = b.encode_utf16().count();
    len_a
        .cmp(&len_b)
        .then_with(|| a.chars().map(fold_case).cmp(b.chars().map(fold_case)))
}

/// Simple uppercase mapping; characters whose uppercase form is not a single
/// character are compared as-is.
#[inline]
fn fold_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Total order over records: directory ordering, then exact name, then DID.
pub(crate) fn compare_records(a: &DirectoryRecord, b: &DirectoryRecord) -> Ordering {
    compare_names(&a.name, &b.name)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.did.cmp(&b.did))
}

/// The parsed directory: the record arena plus the derived entry tree.
#[derive(Debug, Clone)]
pub struct Directory {
    records: Vec<DirectoryRecord>,
    /// Sorted child DIDs per storage DID (empty for everything else)
    children: Vec<Box<[u32]>>,
    /// Parent DID per entry placed in the tree
    parents: Vec<Option<u32>>,
}

impl Directory {
    /// Read every record of the directory stream and rebuild the entry tree.
    pub fn read<S: Read + Seek + ?Sized>(
        source: &mut S,
        header: &Header,
        sat: &AllocationTable,
        options: &OpenOptions,
    ) -> Result<Self> {
        let chain = sat.chain(header.directory_start)?;
        let sector_size = header.sector_size();
        let per_sector = sector_size / DIRENTRY_SIZE;

        let total = chain.len().saturating_mul(per_sector);
        if total > options.max_directory_entries {
            return Err(Error::InvalidFormat(format!(
                "Directory holds {} entries, more than the allowed {}",
                total, options.max_directory_entries
            )));
        }

        let mut records = Vec::with_capacity(total);
        for sid in chain {
            let sector = read_sector(source, sector_size, sid)?;
            for chunk in sector.chunks_exact(DIRENTRY_SIZE) {
                let did = records.len() as u32;
                records.push(DirectoryRecord::parse(chunk, did, sector_size)?);
            }
        }

        Self::from_records(records)
    }

    /// Validate the root record and rebuild the entry tree from `records`.
    pub fn from_records(records: Vec<DirectoryRecord>) -> Result<Self> {
        let root = records
            .first()
            .ok_or_else(|| Error::InvalidFormat("Empty directory stream".to_string()))?;
        if root.kind != EntryKind::Root {
            return Err(Error::InvalidRootEntry(root.kind.as_raw()));
        }

        let count = records.len();
        let mut directory = Self {
            records,
            children: vec![Box::default(); count],
            parents: vec![None; count],
        };
        directory.build_tree()?;
        Ok(directory)
    }

    fn build_tree(&mut self) -> Result<()> {
        let count = self.records.len();
        let mut placed = FixedBitSet::with_capacity(count);
        placed.insert(0);

        let mut pending = vec![0u32];
        while let Some(parent) = pending.pop() {
            let mut kids = Vec::new();
            let mut stack: SmallVec<[u32; 16]> = SmallVec::new();
            let mut node = self.records[parent as usize].child;

            loop {
                while node != NOSTREAM {
                    if node > MAXREGSID || node as usize >= count {
                        return Err(Error::InvalidFormat(format!(
                            "Directory entry {} links to missing entry {}",
                            parent, node
                        )));
                    }
                    if placed.put(node as usize) {
                        return Err(Error::CyclicDirectory { did: node });
                    }
                    stack.push(node);
                    node = self.records[node as usize].left;
                }

                let Some(current) = stack.pop() else {
                    break;
                };
                let record = &self.records[current as usize];
                if record.kind.has_children() {
                    pending.push(current);
                }
                self.parents[current as usize] = Some(parent);
                kids.push(current);
                node = record.right;
            }

            let records = &self.records;
            kids.sort_by(|&a, &b| compare_records(&records[a as usize], &records[b as usize]));
            self.children[parent as usize] = kids.into_boxed_slice();
        }

        Ok(())
    }

    /// Number of records, including unused slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The root record.
    #[inline]
    pub fn root(&self) -> &DirectoryRecord {
        &self.records[0]
    }

    /// All records, indexed by DID.
    #[inline]
    pub fn records(&self) -> &[DirectoryRecord] {
        &self.records
    }

    /// Record for `did`.
    #[inline]
    pub fn record(&self, did: u32) -> Option<&DirectoryRecord> {
        self.records.get(did as usize)
    }

    /// Sorted child DIDs of `did`.
    #[inline]
    pub fn children(&self, did: u32) -> &[u32] {
        self.children.get(did as usize).map(|c| &c[..]).unwrap_or(&[])
    }

    /// Parent DID of `did`, `None` for the root and for unreachable records.
    #[inline]
    pub fn parent(&self, did: u32) -> Option<u32> {
        self.parents.get(did as usize).copied().flatten()
    }
}
