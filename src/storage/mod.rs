//! Tree engine and table layout built on the page store.

/// Clustered B+ tree over fixed-size records.
pub mod btree;

/// Fixed-width row schemas usable as a record codec.
pub mod schema;

pub use btree::{BTree, BTreeOptions, KeyCodec, RangeIter, RecordCodec, VerifyReport};
pub use schema::{Field, FieldKind, Row, Schema, Value};
