use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of B+ tree statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeStatsSnapshot {
    /// Number of root-to-leaf descents performed
    pub descents: u64,
    /// Number of leaf page splits performed
    pub leaf_splits: u64,
    /// Number of internal page splits performed
    pub internal_splits: u64,
    /// Number of times a split grew a new root
    pub root_splits: u64,
    /// Number of leaf page merges performed
    pub leaf_merges: u64,
    /// Number of internal page merges performed
    pub internal_merges: u64,
    /// Number of records moved between sibling leaves
    pub leaf_borrows: u64,
    /// Number of separators rotated between sibling internal pages
    pub internal_borrows: u64,
    /// Number of times the root collapsed into its only child
    pub root_collapses: u64,
}

/// Statistics tracking for B+ tree operations.
#[derive(Default)]
pub struct BTreeStats {
    descents: AtomicU64,
    leaf_splits: AtomicU64,
    internal_splits: AtomicU64,
    root_splits: AtomicU64,
    leaf_merges: AtomicU64,
    internal_merges: AtomicU64,
    leaf_borrows: AtomicU64,
    internal_borrows: AtomicU64,
    root_collapses: AtomicU64,
}

impl BTreeStats {
    pub(crate) fn inc_descents(&self) {
        self.descents.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_splits(&self) {
        self.leaf_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_splits(&self) {
        self.internal_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_root_splits(&self) {
        self.root_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_merges(&self) {
        self.leaf_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_merges(&self) {
        self.internal_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_borrows(&self) {
        self.leaf_borrows.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_borrows(&self) {
        self.internal_borrows.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_root_collapses(&self) {
        self.root_collapses.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> BTreeStatsSnapshot {
        BTreeStatsSnapshot {
            descents: self.descents.load(AtomicOrdering::Relaxed),
            leaf_splits: self.leaf_splits.load(AtomicOrdering::Relaxed),
            internal_splits: self.internal_splits.load(AtomicOrdering::Relaxed),
            root_splits: self.root_splits.load(AtomicOrdering::Relaxed),
            leaf_merges: self.leaf_merges.load(AtomicOrdering::Relaxed),
            internal_merges: self.internal_merges.load(AtomicOrdering::Relaxed),
            leaf_borrows: self.leaf_borrows.load(AtomicOrdering::Relaxed),
            internal_borrows: self.internal_borrows.load(AtomicOrdering::Relaxed),
            root_collapses: self.root_collapses.load(AtomicOrdering::Relaxed),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "clustered_bptree::stats",
            descents = snapshot.descents,
            leaf_splits = snapshot.leaf_splits,
            internal_splits = snapshot.internal_splits,
            root_splits = snapshot.root_splits,
            leaf_merges = snapshot.leaf_merges,
            internal_merges = snapshot.internal_merges,
            leaf_borrows = snapshot.leaf_borrows,
            internal_borrows = snapshot.internal_borrows,
            root_collapses = snapshot.root_collapses,
            "btree stats snapshot"
        );
    }
}
