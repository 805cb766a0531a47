use super::{BTree, Bias, Internal, Leaf};
use crate::storage::btree::codec::{KeyCodec, RecordCodec};
use crate::storage::btree::page::{InternalNode, LeafEntry, LeafNode};
use crate::types::{BTreeError, PageId, Result};

impl<C: RecordCodec> BTree<C> {
    /// Inserts `record` after every existing record with an equal key.
    ///
    /// Splits the leaf when it exceeds the block factor and carries separators
    /// upward, growing a new root when the split reaches the top. A key longer
    /// than [`BTree::max_key_len`] is rejected before any page is touched.
    pub fn insert(&mut self, record: C::Record) -> Result<()> {
        let key = self.codec.key_of(&record)?;
        let mut encoded = Vec::new();
        key.encode_key(&mut encoded);
        if encoded.len() > self.key_limit {
            return Err(BTreeError::Invalid("key longer than an internal page allows"));
        }
        let (mut path, leaf_id, mut leaf) = self.descend(&key, Bias::Right)?;
        let pos = leaf.upper_bound(&key);
        leaf.entries.insert(pos, LeafEntry { key, record });
        if leaf.entries.len() <= self.block_factor {
            return self.write_leaf(leaf_id, &leaf);
        }

        let (mut separator, mut right_id) = self.split_leaf(leaf_id, leaf)?;
        while let Some(parent) = path.pop() {
            let mut node = self.load_internal(parent.page_id)?;
            node.keys.insert(parent.child_index, separator);
            node.children.insert(parent.child_index + 1, right_id);
            if node.keys.len() <= self.order {
                return self.write_internal(parent.page_id, &node);
            }
            (separator, right_id) = self.split_internal(parent.page_id, node)?;
        }
        self.grow_root(separator, right_id)
    }

    /// Moves the upper half of an overfull leaf to a new right sibling.
    fn split_leaf(&mut self, leaf_id: PageId, mut leaf: Leaf<C>) -> Result<(C::Key, PageId)> {
        let mid = leaf.entries.len() / 2;
        let upper = leaf.entries.split_off(mid);
        let separator = upper
            .first()
            .map(|entry| entry.key.clone())
            .ok_or(BTreeError::Invalid("split of a leaf with fewer than two records"))?;

        let right_id = self.store.allocate()?;
        let old_next = leaf.next;
        let right = LeafNode {
            entries: upper,
            prev: Some(leaf_id),
            next: old_next,
        };
        leaf.next = Some(right_id);
        self.write_leaf(right_id, &right)?;
        self.write_leaf(leaf_id, &leaf)?;
        if let Some(next_id) = old_next {
            let mut next = self.load_leaf(next_id)?;
            next.prev = Some(right_id);
            self.write_leaf(next_id, &next)?;
        }

        self.stats.inc_leaf_splits();
        tracing::trace!(
            target: "clustered_bptree::split",
            left = leaf_id.0,
            right = right_id.0,
            left_len = leaf.entries.len(),
            right_len = right.entries.len(),
            "split leaf page"
        );
        Ok((separator, right_id))
    }

    /// Splits an internal page around its middle key, which moves up to the parent.
    fn split_internal(
        &mut self,
        page_id: PageId,
        mut node: Internal<C>,
    ) -> Result<(C::Key, PageId)> {
        let mid = node.keys.len() / 2;
        let right_keys = node.keys.split_off(mid + 1);
        let separator = node
            .keys
            .pop()
            .ok_or(BTreeError::Invalid("split of an internal page without keys"))?;
        let right_children = node.children.split_off(mid + 1);
        let right = InternalNode {
            keys: right_keys,
            children: right_children,
        };

        let right_id = self.store.allocate()?;
        self.write_internal(right_id, &right)?;
        self.write_internal(page_id, &node)?;

        self.stats.inc_internal_splits();
        tracing::trace!(
            target: "clustered_bptree::split",
            left = page_id.0,
            right = right_id.0,
            "split internal page"
        );
        Ok((separator, right_id))
    }

    fn grow_root(&mut self, separator: C::Key, right_id: PageId) -> Result<()> {
        let old_root = self.store.root();
        let root = InternalNode {
            keys: vec![separator],
            children: vec![old_root, right_id],
        };
        let root_id = self.store.allocate()?;
        self.write_internal(root_id, &root)?;
        self.store.set_root(root_id)?;
        self.stats.inc_root_splits();
        tracing::trace!(
            target: "clustered_bptree::split",
            old_root = old_root.0,
            new_root = root_id.0,
            "grew new root"
        );
        Ok(())
    }
}
