use std::path::Path;

use tracing::debug;

use super::codec::RecordCodec;
use super::cursor::RangeIter;
use super::options::{BTreeOptions, MIN_ORDER};
use super::page::{self, InternalNode, LeafNode, Node, NodeCodec};
use super::stats::{BTreeStats, BTreeStatsSnapshot};
use crate::primitives::pager::{PageStore, PagerStats};
use crate::types::{BTreeError, PageId, Result};

mod delete;
mod insert;
mod verify;

pub use verify::VerifyReport;

/// Descents deeper than this are treated as a cycle in the page graph.
const MAX_DEPTH: usize = 64;

pub(crate) type Leaf<C> = LeafNode<<C as RecordCodec>::Key, <C as RecordCodec>::Record>;
pub(crate) type Internal<C> = InternalNode<<C as RecordCodec>::Key>;

/// One step of a root-to-leaf descent: the internal page and the child slot taken.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathEntry {
    pub(crate) page_id: PageId,
    pub(crate) child_index: usize,
}

/// How ties between a search key and a separator are routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bias {
    /// Leftmost subtree that may contain the key.
    Left,
    /// Subtree after every separator equal to the key.
    Right,
}

/// Disk-resident clustered B+ tree over fixed-size records.
///
/// Leaves store whole records sorted by key and are chained in both
/// directions; internal pages store separator keys. Every operation writes its
/// pages through the [`PageStore`] before returning.
pub struct BTree<C: RecordCodec> {
    store: PageStore,
    codec: C,
    options: BTreeOptions,
    order: usize,
    key_limit: usize,
    block_factor: usize,
    stats: BTreeStats,
}

impl<C: RecordCodec> BTree<C> {
    /// Opens the tree stored at `path`, creating the file and an empty root leaf when needed.
    pub fn open(path: impl AsRef<Path>, codec: C, options: BTreeOptions) -> Result<Self> {
        options.validate()?;
        let store = PageStore::open(path, options.pager.clone())?;
        Self::with_store(store, codec, options)
    }

    /// Opens the tree on an already opened page store.
    pub fn with_store(mut store: PageStore, codec: C, options: BTreeOptions) -> Result<Self> {
        options.validate()?;
        let page_size = store.page_size();
        let record_size = codec.record_size();
        if record_size == 0 {
            return Err(BTreeError::Invalid("record size must be positive"));
        }
        if page::LEAF_HEADER_LEN + record_size > page_size {
            return Err(BTreeError::Invalid("record does not fit in a leaf page"));
        }
        let (order, key_limit) = match codec.max_key_len() {
            Some(key_len) => {
                let fits = page::max_order(page_size, key_len);
                if fits < MIN_ORDER {
                    return Err(BTreeError::Invalid(
                        "keys too wide for three separators per internal page",
                    ));
                }
                let order = options.order.min(fits);
                if order < options.order {
                    debug!(
                        requested = options.order,
                        order,
                        key_len,
                        "btree.clamp_order"
                    );
                }
                (order, key_len)
            }
            None => {
                let room = page::key_room(page_size, options.order);
                if room == 0 {
                    return Err(BTreeError::Invalid(
                        "order separators do not fit in one internal page",
                    ));
                }
                (options.order, room)
            }
        };
        store.bind_record_size(record_size)?;
        let physical = page::block_factor(page_size, record_size);
        let block_factor = options
            .leaf_capacity
            .map_or(physical, |cap| cap.min(physical));

        let mut tree = Self {
            store,
            codec,
            options,
            order,
            key_limit,
            block_factor,
            stats: BTreeStats::default(),
        };
        if tree.store.root().is_null() {
            let root = tree.store.allocate()?;
            tree.write_leaf(root, &LeafNode::empty())?;
            tree.store.set_root(root)?;
            debug!(root = root.0, "btree.create_root");
        }
        debug!(
            root = tree.store.root().0,
            block_factor = tree.block_factor,
            order = tree.order,
            key_limit = tree.key_limit,
            record_size,
            "btree.open"
        );
        Ok(tree)
    }

    /// Returns the root page identifier.
    pub fn root_page(&self) -> PageId {
        self.store.root()
    }

    /// Maximum records per leaf.
    pub fn block_factor(&self) -> usize {
        self.block_factor
    }

    /// Maximum separator keys per internal page.
    ///
    /// This is the configured order, lowered when the codec's widest key would
    /// not let that many separators share one page.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Longest encoded key `insert` accepts.
    pub fn max_key_len(&self) -> usize {
        self.key_limit
    }

    /// Minimum records a non-root leaf keeps after a removal; never below one.
    pub fn leaf_min(&self) -> usize {
        self.block_factor.div_ceil(2).saturating_sub(1).max(1)
    }

    /// Minimum keys a non-root internal page keeps after a removal.
    pub fn internal_min(&self) -> usize {
        self.order.div_ceil(2).saturating_sub(1)
    }

    /// The record codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The underlying page store.
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Number of levels from the root down to the leaves; a lone root leaf is height 1.
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut current = self.store.root();
        while let Node::Internal(node) = self.load(current)? {
            height += 1;
            if height > MAX_DEPTH {
                return Err(BTreeError::Corruption("tree deeper than maximum".into()));
            }
            current = first_child(&node)?;
        }
        Ok(height)
    }

    /// Returns true when the tree holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        match self.load(self.store.root())? {
            Node::Leaf(leaf) => Ok(leaf.entries.is_empty()),
            Node::Internal(_) => Ok(false),
        }
    }

    /// Returns every record whose key equals `key`, in insertion order.
    pub fn search(&self, key: &C::Key) -> Result<Vec<C::Record>> {
        self.range_search(key, key)?.collect()
    }

    /// Lazily yields records with `lo <= key <= hi` in ascending key order.
    pub fn range_search(&self, lo: &C::Key, hi: &C::Key) -> Result<RangeIter<'_, C>> {
        if lo > hi {
            return Ok(RangeIter::empty(self));
        }
        let (_, _, leaf) = self.descend(lo, Bias::Left)?;
        let start = leaf.lower_bound(lo);
        Ok(RangeIter::new(self, leaf, start, Some(hi.clone())))
    }

    /// Lazily yields every record in key order.
    pub fn iter_all(&self) -> Result<RangeIter<'_, C>> {
        let leaf = self.leftmost_leaf()?;
        Ok(RangeIter::new(self, leaf, 0, None))
    }

    /// Snapshot the current statistics counters.
    pub fn stats_snapshot(&self) -> BTreeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Emit the current statistics to the tracing sink.
    pub fn emit_stats(&self) {
        self.stats.emit_tracing();
    }

    /// Page I/O counters of the underlying store.
    pub fn pager_stats(&self) -> PagerStats {
        self.store.stats()
    }

    /// Zeroes the page I/O counters.
    pub fn reset_pager_stats(&self) {
        self.store.reset_stats();
    }

    /// Flushes the header and releases the file.
    pub fn close(self) -> Result<()> {
        debug!(root = self.store.root().0, "btree.close");
        self.store.close()
    }

    fn nodes(&self) -> NodeCodec<'_, C> {
        NodeCodec::new(
            &self.codec,
            self.store.page_size(),
            self.block_factor,
            self.order,
        )
    }

    pub(crate) fn load(&self, page_id: PageId) -> Result<Node<C::Key, C::Record>> {
        let page = self.store.read(page_id)?;
        self.nodes().decode(&page)
    }

    pub(crate) fn load_leaf(&self, page_id: PageId) -> Result<Leaf<C>> {
        let page = self.store.read(page_id)?;
        self.nodes().decode_leaf(&page)
    }

    pub(crate) fn load_internal(&self, page_id: PageId) -> Result<Internal<C>> {
        let page = self.store.read(page_id)?;
        self.nodes().decode_internal(&page)
    }

    pub(crate) fn write_leaf(&mut self, page_id: PageId, leaf: &Leaf<C>) -> Result<()> {
        let page = self.nodes().encode_leaf(leaf)?;
        self.store.write(page_id, &page)
    }

    pub(crate) fn write_internal(&mut self, page_id: PageId, node: &Internal<C>) -> Result<()> {
        let page = self.nodes().encode_internal(node)?;
        self.store.write(page_id, &page)
    }

    /// Walks from the root to a leaf, recording each internal page and child slot.
    pub(crate) fn descend(
        &self,
        key: &C::Key,
        bias: Bias,
    ) -> Result<(Vec<PathEntry>, PageId, Leaf<C>)> {
        self.stats.inc_descents();
        let mut path = Vec::new();
        let mut current = self.store.root();
        loop {
            match self.load(current)? {
                Node::Leaf(leaf) => return Ok((path, current, leaf)),
                Node::Internal(node) => {
                    let child_index = match bias {
                        Bias::Left => node.child_index_left(key),
                        Bias::Right => node.child_index_right(key),
                    };
                    path.push(PathEntry {
                        page_id: current,
                        child_index,
                    });
                    if path.len() > MAX_DEPTH {
                        return Err(BTreeError::Corruption("tree deeper than maximum".into()));
                    }
                    current = child_at(&node, child_index)?;
                }
            }
        }
    }

    /// Moves `path` to the leaf following the one it ends at, using parent slots only.
    pub(crate) fn advance_path(
        &self,
        path: &mut Vec<PathEntry>,
    ) -> Result<Option<(PageId, Leaf<C>)>> {
        while let Some(mut entry) = path.pop() {
            let node = self.load_internal(entry.page_id)?;
            if entry.child_index + 1 >= node.children.len() {
                continue;
            }
            entry.child_index += 1;
            let mut current = child_at(&node, entry.child_index)?;
            path.push(entry);
            loop {
                match self.load(current)? {
                    Node::Leaf(leaf) => return Ok(Some((current, leaf))),
                    Node::Internal(inner) => {
                        path.push(PathEntry {
                            page_id: current,
                            child_index: 0,
                        });
                        if path.len() > MAX_DEPTH {
                            return Err(BTreeError::Corruption(
                                "tree deeper than maximum".into(),
                            ));
                        }
                        current = first_child(&inner)?;
                    }
                }
            }
        }
        Ok(None)
    }

    fn leftmost_leaf(&self) -> Result<Leaf<C>> {
        let mut current = self.store.root();
        let mut depth = 0;
        loop {
            match self.load(current)? {
                Node::Leaf(leaf) => return Ok(leaf),
                Node::Internal(node) => {
                    depth += 1;
                    if depth > MAX_DEPTH {
                        return Err(BTreeError::Corruption("tree deeper than maximum".into()));
                    }
                    current = first_child(&node)?;
                }
            }
        }
    }
}

pub(crate) fn child_at<K>(node: &InternalNode<K>, index: usize) -> Result<PageId> {
    node.children
        .get(index)
        .copied()
        .ok_or_else(|| BTreeError::Corruption(format!("missing child slot {index}")))
}

fn first_child<K>(node: &InternalNode<K>) -> Result<PageId> {
    child_at(node, 0)
}
