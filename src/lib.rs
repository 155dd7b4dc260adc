//! Litchi CFB - A read-only reader for OLE2 Compound Documents
//!
//! Compound documents (also called Compound File Binary, or structured
//! storage) are the container format behind legacy Microsoft Office files
//! (.doc, .xls, .ppt), Windows thumbnail caches (Thumbs.db), MSI packages and
//! many other binary formats. A document is a small file system: a tree of
//! storages (directories) and streams (files) packed into fixed-size sectors.
//!
//! # Features
//!
//! - **Header parsing**: version 3 (512-byte sectors) and version 4
//!   (4096-byte sectors), including master SAT (DIFAT) chains
//! - **Entry tree**: storages and streams with sorted, immutable child lists
//! - **Streams**: `Read + Seek` access to standard and mini streams
//! - **Corruption checks**: cyclic chains, cyclic directories and
//!   out-of-range sector ids fail with an error instead of hanging
//! - **Any source**: files, in-memory buffers, or plain readers
//!
//! # Example - Listing a thumbnail cache
//!
//! ```no_run
//! use std::io::Read;
//! use litchi_cfb::ole::CompoundDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = CompoundDocument::open_path("Thumbs.db")?;
//! let root = doc.root_entry();
//!
//! for entry in root.child_entries() {
//!     println!("{} ({} bytes)", entry.name(), entry.len());
//! }
//!
//! if let Some(catalog) = root.child_entry("Catalog") {
//!     if let Some(mut stream) = catalog.input_stream()? {
//!         let mut data = Vec::new();
//!         stream.read_to_end(&mut data)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Path lookup
//!
//! ```no_run
//! use litchi_cfb::ole::CompoundDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("report.doc")?;
//! let doc = CompoundDocument::from_bytes(bytes)?;
//!
//! if let Some(ole) = doc.entry_by_path("/ObjectPool/_1234/\u{1}Ole")? {
//!     println!("{}", ole);
//! }
//! # Ok(())
//! # }
//! ```

/// Shared building blocks: errors, byte sources and binary helpers
pub mod common;

/// Compound document reader
pub mod ole;

pub use common::error::{Error, Result};
pub use ole::{CompoundDocument, Entry, OpenOptions};
