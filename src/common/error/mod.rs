//! Unified error types for compound document parsing.
//!
//! Every fallible operation in this crate reports an [`Error`]. Variants fall
//! into three groups: format errors (the container itself is malformed),
//! bounds errors (the caller asked for something that does not exist), and
//! I/O errors from the underlying byte source, which are passed through as-is.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
