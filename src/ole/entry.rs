//! Lightweight views of directory entries.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek};

use chrono::{DateTime, Utc};

use super::directory::{DirectoryRecord, EntryKind, compare_records};
use super::document::CompoundDocument;
use super::stream::EntryStream;
use crate::common::binary::{filetime_to_datetime, format_clsid};
use crate::common::error::{Error, Result};

/// A directory entry (storage, stream or the root) of a [`CompoundDocument`].
///
/// Entries are cheap `Copy` views into the document that produced them and
/// cannot outlive it. Two entries compare the way siblings are ordered in
/// the directory: shorter names first, then case-insensitively.
pub struct Entry<'a, R> {
    doc: &'a CompoundDocument<R>,
    did: u32,
}

impl<R> Clone for Entry<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Entry<'_, R> {}

impl<'a, R> Entry<'a, R> {
    pub(crate) fn new(doc: &'a CompoundDocument<R>, did: u32) -> Self {
        Self { doc, did }
    }

    #[inline]
    fn record(&self) -> &'a DirectoryRecord {
        self.doc.record(self.did)
    }

    /// Entry name.
    #[inline]
    pub fn name(&self) -> &'a str {
        &self.record().name
    }

    /// Entry kind.
    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.record().kind
    }

    /// Directory id of the entry.
    #[inline]
    pub fn did(&self) -> u32 {
        self.did
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.kind() == EntryKind::Root
    }

    /// Whether this is a storage other than the root.
    #[inline]
    pub fn is_storage(&self) -> bool {
        self.kind() == EntryKind::Storage
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        self.kind() == EntryKind::Stream
    }

    /// Length of the stream in bytes; 0 for anything but a stream.
    #[inline]
    pub fn len(&self) -> u64 {
        if self.is_stream() {
            self.record().size
        } else {
            0
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First sector (or mini sector) of the entry's data.
    #[inline]
    pub fn start_sector(&self) -> u32 {
        self.record().start_sector
    }

    /// Raw class id.
    #[inline]
    pub fn class_id(&self) -> &'a [u8; 16] {
        &self.record().class_id
    }

    /// Class id formatted as a GUID string, empty when unset.
    pub fn class_id_string(&self) -> String {
        format_clsid(self.class_id())
    }

    /// User flags.
    #[inline]
    pub fn state_bits(&self) -> u32 {
        self.record().state_bits
    }

    /// Creation time, if recorded.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.record().created)
    }

    /// Last modification time, if recorded.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.record().modified)
    }

    /// The storage containing this entry; `None` for the root.
    pub fn parent(&self) -> Option<Entry<'a, R>> {
        self.doc
            .directory()
            .parent(self.did)
            .map(|did| Entry::new(self.doc, did))
    }

    /// Children of this entry, sorted; empty for anything but a storage.
    pub fn child_entries(&self) -> ChildEntries<'a, R> {
        ChildEntries {
            doc: self.doc,
            dids: self.doc.directory().children(self.did),
        }
    }

    /// The child named exactly `name`.
    pub fn child_entry(&self, name: &str) -> Option<Entry<'a, R>> {
        self.child_entries().iter().find(|child| child.name() == name)
    }
}

impl<'a, R: Read + Seek> Entry<'a, R> {
    /// Open the entry's contents for reading.
    ///
    /// Returns `Ok(None)` for storages and the root. Every call creates an
    /// independent stream positioned at 0.
    pub fn input_stream(&self) -> Result<Option<EntryStream<'a, R>>> {
        if !self.is_stream() {
            return Ok(None);
        }

        let len = self.len();
        if len > 0 {
            let table = if self.doc.header().is_mini_stream(len) {
                self.doc.ssat()
            } else {
                self.doc.sat()
            };
            let start = self.start_sector();
            if start >= table.limit() {
                return Err(Error::SectorOutOfRange {
                    sid: start,
                    limit: table.limit(),
                });
            }
        }

        Ok(Some(EntryStream::new(self.doc, self.start_sector(), len)))
    }
}

impl<R> PartialEq for Entry<'_, R> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.did == other.did
    }
}

impl<R> Eq for Entry<'_, R> {}

impl<R> PartialOrd for Entry<'_, R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for Entry<'_, R> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_records(self.record(), other.record())
    }
}

impl<R> Hash for Entry<'_, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.did.hash(state);
    }
}

impl<R> fmt::Debug for Entry<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("did", &self.did)
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

impl<R> fmt::Display for Entry<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent().map(|p| p.name()).unwrap_or("");
        write!(
            f,
            "Entry[name: {:?}, type: {}, parent: {:?}, children: {}, SID: {}, length: {}]",
            self.name(),
            self.kind(),
            parent,
            self.child_entries().len(),
            self.start_sector(),
            self.len()
        )
    }
}

/// Immutable, sorted snapshot of a storage's children.
///
/// The snapshot only offers read access; there is no way to add or remove
/// children through it.
///
/// ```compile_fail
/// use litchi_cfb::ole::CompoundDocument;
///
/// let doc = CompoundDocument::from_bytes(Vec::new()).unwrap();
/// let mut children = doc.root_entry().child_entries();
/// children.remove(0);
/// ```
pub struct ChildEntries<'a, R> {
    doc: &'a CompoundDocument<R>,
    dids: &'a [u32],
}

impl<R> Clone for ChildEntries<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for ChildEntries<'_, R> {}

impl<'a, R> ChildEntries<'a, R> {
    #[inline]
    pub fn len(&self) -> usize {
        self.dids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dids.is_empty()
    }

    /// Child at `index` in sorted order.
    pub fn get(&self, index: usize) -> Option<Entry<'a, R>> {
        self.dids.get(index).map(|&did| Entry::new(self.doc, did))
    }

    /// Smallest child.
    pub fn first(&self) -> Option<Entry<'a, R>> {
        self.get(0)
    }

    /// Largest child.
    pub fn last(&self) -> Option<Entry<'a, R>> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Whether `entry` is one of the children.
    pub fn contains(&self, entry: &Entry<'_, R>) -> bool {
        std::ptr::eq(self.doc, entry.doc) && self.dids.contains(&entry.did)
    }

    pub fn iter(&self) -> ChildIter<'a, R> {
        ChildIter {
            doc: self.doc,
            dids: self.dids.iter(),
        }
    }
}

impl<'a, R> IntoIterator for ChildEntries<'a, R> {
    type Item = Entry<'a, R>;
    type IntoIter = ChildIter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, R> IntoIterator for &ChildEntries<'a, R> {
    type Item = Entry<'a, R>;
    type IntoIter = ChildIter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<R> fmt::Debug for ChildEntries<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over a [`ChildEntries`] snapshot.
pub struct ChildIter<'a, R> {
    doc: &'a CompoundDocument<R>,
    dids: std::slice::Iter<'a, u32>,
}

impl<'a, R> Iterator for ChildIter<'a, R> {
    type Item = Entry<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.dids.next().map(|&did| Entry::new(self.doc, did))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.dids.size_hint()
    }
}

impl<R> DoubleEndedIterator for ChildIter<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.dids.next_back().map(|&did| Entry::new(self.doc, did))
    }
}

impl<R> ExactSizeIterator for ChildIter<'_, R> {}
