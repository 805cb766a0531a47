#![forbid(unsafe_code)]

//! Identifiers and the error taxonomy shared by the pager and the tree.

use std::fmt;

/// Index of a fixed-size page inside the page file.
///
/// Page 0 holds the file header, so `PageId(0)` is also used as the
/// "no page" sentinel in on-disk link fields.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct PageId(pub u64);

impl PageId {
    /// The header page, also the null link.
    pub const HEADER: PageId = PageId(0);

    /// Returns true when this id is the null link.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Maps the null link to `None`.
    pub fn non_null(self) -> Option<PageId> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by the page store and the B+Tree engine.
#[derive(thiserror::Error, Debug)]
pub enum BTreeError {
    /// Underlying file I/O failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// The header page is not a valid page file header.
    #[error("corrupt header: {0}")]
    CorruptHeader(&'static str),
    /// A page buffer exceeded the configured page size.
    #[error("page overflow: {len} bytes exceeds page size {page_size}")]
    PageOverflow {
        /// Length of the rejected buffer.
        len: usize,
        /// Configured page size.
        page_size: usize,
    },
    /// A page could not be interpreted as a tree node.
    #[error("invalid page: {0}")]
    InvalidPage(&'static str),
    /// A node no longer fits its page; the split thresholds were not honoured.
    #[error("node overflow: {0}")]
    Overflow(&'static str),
    /// The on-disk structure violates a tree invariant.
    #[error("corruption: {0}")]
    Corruption(String),
    /// A caller supplied an invalid argument or option.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The record codec rejected a record.
    #[error("codec: {0}")]
    Codec(String),
    /// A configuration source could not be read or parsed.
    #[error("config: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BTreeError>;
