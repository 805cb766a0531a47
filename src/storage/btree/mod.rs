#![forbid(unsafe_code)]

//! Clustered B+ tree over fixed-size records.

/// Key and record encoding traits.
pub mod codec;
/// Leaf and internal page formats.
pub mod page;

mod cursor;
mod options;
mod stats;
mod tree;

pub use codec::{KeyCodec, RecordCodec};
pub use cursor::RangeIter;
pub use options::{BTreeOptions, DEFAULT_ORDER, MIN_ORDER};
pub use stats::{BTreeStats, BTreeStatsSnapshot};
pub use tree::{BTree, VerifyReport};
