//! Common types and utilities used by the compound document reader.

// Submodule declarations
pub mod binary;
pub mod error;
pub mod source;

// Re-exports for convenience
pub use error::{Error, Result};
pub use source::{ByteSource, MemoryCacheSource, is_compound_document, is_compound_document_bytes};
