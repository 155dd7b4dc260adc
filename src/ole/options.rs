use serde::{Deserialize, Serialize};

/// Options controlling how a compound document is opened.
///
/// This struct controls source ownership and the sanity limits applied while
/// the header, allocation tables and directory are parsed.
///
/// # Examples
///
/// ```rust
/// use litchi_cfb::ole::OpenOptions;
///
/// // Create with defaults
/// let options = OpenOptions::default();
/// assert!(!options.owns_source);
///
/// // Or customize
/// let options = OpenOptions::new()
///     .with_owns_source(true)
///     .with_strict_sector_size(false)
///     .with_max_directory_entries(4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Whether the document owns its byte source.
    ///
    /// An owning document drops the source on [`close`](super::CompoundDocument::close);
    /// a non-owning one hands it back to the caller.
    pub owns_source: bool,
    /// Upper bound on the number of directory records read at open time
    pub max_directory_entries: usize,
    /// Reject documents whose major version disagrees with the sector size
    pub strict_sector_size: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            owns_source: false,
            max_directory_entries: 1 << 20,
            strict_sector_size: true,
        }
    }
}

impl OpenOptions {
    /// Create a new `OpenOptions` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the document owns (and closes) its byte source.
    #[inline]
    pub fn with_owns_source(mut self, owns: bool) -> Self {
        self.owns_source = owns;
        self
    }

    /// Set the maximum number of directory records.
    ///
    /// Documents with a longer directory stream fail to open with a format
    /// error instead of allocating without bound.
    #[inline]
    pub fn with_max_directory_entries(mut self, max: usize) -> Self {
        self.max_directory_entries = max;
        self
    }

    /// Set whether version 3 must use 512-byte sectors and version 4
    /// 4096-byte sectors.
    ///
    /// When disabled, any sector shift from 7 to 16 is accepted.
    #[inline]
    pub fn with_strict_sector_size(mut self, strict: bool) -> Self {
        self.strict_sector_size = strict;
        self
    }
}
