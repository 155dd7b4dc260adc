//! OLE2 Compound Document reader.
//!
//! Parsing happens in layers, each built on the previous one:
//!
//! 1. [`header`]: geometry and the complete master SAT
//! 2. [`sat`]: the sector allocation tables (SAT and SSAT)
//! 3. [`directory`]: directory records and the entry tree
//! 4. [`stream`]: entry contents, read through sector chains
//!
//! [`CompoundDocument`] ties the layers together; [`Entry`] and
//! [`EntryStream`] are the views handed out to callers.

/// Constants for the compound document format
pub mod consts;

/// Header parsing
pub mod header;

/// Sector allocation tables
pub mod sat;

/// Directory records and the entry tree
pub mod directory;

mod document;
mod entry;
mod options;
mod stream;

#[cfg(test)]
pub(crate) mod testing;


// Re-export public types for convenient access
pub use directory::{EntryKind, compare_names};
pub use document::CompoundDocument;
pub use entry::{ChildEntries, ChildIter, Entry};
pub use header::Header;
pub use options::OpenOptions;
pub use sat::AllocationTable;
pub use stream::EntryStream;
pub use crate::common::source::{is_compound_document, is_compound_document_bytes};
