//! Disk-resident clustered B+ tree.
//!
//! Records of a fixed width live sorted by key in chained leaf pages of a
//! single page file; internal pages hold separator keys. Pages freed by
//! merges are kept on a free list and reused before the file grows.
//!
//! ```no_run
//! use clustered_bptree::{BTree, BTreeOptions, Field, FieldKind, Row, Schema, Value};
//!
//! # fn main() -> clustered_bptree::Result<()> {
//! let schema = Schema::new(
//!     vec![
//!         Field::new("id", FieldKind::Int32),
//!         Field::new("name", FieldKind::Char(16)),
//!     ],
//!     "id",
//! )?;
//! let mut tree = BTree::open("people.db", schema, BTreeOptions::default())?;
//! tree.insert(Row(vec![Value::Int(1), "ada".into()]))?;
//! let key = tree.codec().key(&"1".into())?;
//! assert_eq!(tree.search(&key)?.len(), 1);
//! tree.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use primitives::pager::{PageStore, PagerOptions, PagerStats, Synchronous};
pub use storage::btree::{BTreeStatsSnapshot, RangeIter, VerifyReport};
pub use storage::{BTree, BTreeOptions, Field, FieldKind, KeyCodec, RecordCodec, Row, Schema, Value};
pub use types::{BTreeError, PageId, Result};
