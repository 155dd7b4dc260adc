//! Error type definitions.
use thiserror::Error;

/// Main error type for compound document operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The 8-byte signature does not match the OLE2 magic
    #[error("Not an OLE 2 Compound Document")]
    NotCompoundDocument,

    /// The source ended before a complete header sector could be read
    #[error("Truncated header: expected at least {expected} bytes, got {available}")]
    TruncatedHeader { expected: u64, available: u64 },

    /// Byte-order mark other than 0xFFFE
    #[error("Cannot read big endian OLE 2 Compound Documents (byte order {0:#06X})")]
    UnsupportedByteOrder(u16),

    /// Structurally invalid header or directory field
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A sector id that points outside the addressable range
    #[error("Sector id {sid} out of range (limit {limit})")]
    SectorOutOfRange { sid: u32, limit: u32 },

    /// A structural sector that runs past the end of the source
    #[error("Sector {sid} is cut short by the end of the file")]
    TruncatedSector { sid: u32 },

    /// A sector chain that revisits one of its own sectors
    #[error("Cyclic sector chain at sector {sid}")]
    CyclicChain { sid: u32 },

    /// A directory tree that revisits one of its own entries
    #[error("Cyclic chain reference for entry: {did}")]
    CyclicDirectory { did: u32 },

    /// Directory record 0 is not a root storage
    #[error("Invalid root storage type: {0}")]
    InvalidRootEntry(u8),

    /// A stream's sector chain is too short to hold its declared size
    #[error("Truncated sector chain: need {needed} sectors, chain has {available}")]
    TruncatedChain { needed: u64, available: usize },

    /// Directory id outside the directory record array
    #[error("Directory id {did} out of range ({count} entries)")]
    DirectoryIdOutOfRange { did: u32, count: usize },

    /// A child was requested from an entry that is not a storage
    #[error("Not a storage: {0}")]
    NotAStorage(String),

    /// A path that is empty or not absolute
    #[error("Path must be absolute, and contain a valid path: {0:?}")]
    InvalidPath(String),
}

impl Error {
    /// Whether this error describes a malformed container.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::NotCompoundDocument
                | Error::TruncatedHeader { .. }
                | Error::UnsupportedByteOrder(_)
                | Error::InvalidFormat(_)
                | Error::SectorOutOfRange { .. }
                | Error::TruncatedSector { .. }
                | Error::CyclicChain { .. }
                | Error::CyclicDirectory { .. }
                | Error::InvalidRootEntry(_)
                | Error::TruncatedChain { .. }
        )
    }

    /// Whether this error is a caller-contract violation.
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self,
            Error::DirectoryIdOutOfRange { .. } | Error::NotAStorage(_) | Error::InvalidPath(_)
        )
    }
}

/// Result type for compound document operations.
pub type Result<T> = std::result::Result<T, Error>;
