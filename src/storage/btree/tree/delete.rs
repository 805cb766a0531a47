use super::{child_at, BTree, Bias, Internal, Leaf, PathEntry};
use crate::storage::btree::codec::RecordCodec;
use crate::storage::btree::page::{InternalNode, LeafNode};
use crate::types::{BTreeError, PageId, Result};

impl<C: RecordCodec> BTree<C> {
    /// Removes records whose key equals `key` and returns how many were removed.
    ///
    /// With `only_first` at most the earliest inserted match goes; otherwise
    /// every match does. A missing key removes nothing.
    pub fn remove(&mut self, key: &C::Key, only_first: bool) -> Result<usize> {
        let mut removed = 0;
        while let Some((path, leaf_id, mut leaf, start)) = self.locate_first(key)? {
            let end = if only_first {
                start + 1
            } else {
                leaf.upper_bound(key)
            };
            leaf.entries.drain(start..end);
            removed += end - start;
            self.rebalance_leaf(path, leaf_id, leaf)?;
            if only_first {
                break;
            }
        }
        if removed > 0 {
            tracing::trace!(
                target: "clustered_bptree::delete",
                removed,
                only_first,
                "removed records"
            );
        }
        Ok(removed)
    }

    /// Finds the leaf holding the first record equal to `key`, walking past
    /// leaves whose records all sort below it.
    #[allow(clippy::type_complexity)]
    fn locate_first(
        &self,
        key: &C::Key,
    ) -> Result<Option<(Vec<PathEntry>, PageId, Leaf<C>, usize)>> {
        let (mut path, mut leaf_id, mut leaf) = self.descend(key, Bias::Left)?;
        let mut pos = leaf.lower_bound(key);
        while pos == leaf.entries.len() {
            match self.advance_path(&mut path)? {
                Some((next_id, next)) => {
                    leaf_id = next_id;
                    leaf = next;
                    pos = leaf.lower_bound(key);
                }
                None => return Ok(None),
            }
        }
        if leaf.entries[pos].key != *key {
            return Ok(None);
        }
        Ok(Some((path, leaf_id, leaf, pos)))
    }

    /// Restores leaf occupancy after a removal: borrow from a sibling with
    /// records to spare, otherwise merge with one.
    fn rebalance_leaf(
        &mut self,
        mut path: Vec<PathEntry>,
        leaf_id: PageId,
        mut leaf: Leaf<C>,
    ) -> Result<()> {
        let min = self.leaf_min();
        let parent_entry = match path.pop() {
            Some(entry) if leaf.entries.len() < min => entry,
            _ => return self.write_leaf(leaf_id, &leaf),
        };
        let parent_id = parent_entry.page_id;
        let idx = parent_entry.child_index;
        let mut parent = self.load_internal(parent_id)?;
        let left_id = match idx.checked_sub(1) {
            Some(left_idx) => Some(child_at(&parent, left_idx)?),
            None => None,
        };
        let right_id = parent.children.get(idx + 1).copied();

        let mut left = left_id.map(|id| self.load_leaf(id)).transpose()?;
        let mut left_dirty = false;
        if let Some(left_leaf) = left.as_mut() {
            let take = spare(left_leaf.entries.len(), min, leaf.entries.len());
            if take > 0 {
                let split_at = left_leaf.entries.len() - take;
                let moved = left_leaf.entries.split_off(split_at);
                leaf.entries.splice(0..0, moved);
                parent.keys[idx - 1] = leading_key(&leaf)?;
                left_dirty = true;
                self.stats.inc_leaf_borrows();
                tracing::trace!(
                    target: "clustered_bptree::borrow",
                    from = left_id.map_or(0, |id| id.0),
                    into = leaf_id.0,
                    moved = take,
                    "borrowed records from left leaf"
                );
            }
        }

        let mut right = None;
        let mut right_dirty = false;
        if leaf.entries.len() < min {
            if let Some(id) = right_id {
                let mut right_leaf = self.load_leaf(id)?;
                let take = spare(right_leaf.entries.len(), min, leaf.entries.len());
                if take > 0 {
                    leaf.entries.extend(right_leaf.entries.drain(..take));
                    parent.keys[idx] = leading_key(&right_leaf)?;
                    right_dirty = true;
                    self.stats.inc_leaf_borrows();
                    tracing::trace!(
                        target: "clustered_bptree::borrow",
                        from = id.0,
                        into = leaf_id.0,
                        moved = take,
                        "borrowed records from right leaf"
                    );
                }
                right = Some(right_leaf);
            }
        }

        if leaf.entries.len() >= min {
            if let (true, Some(id), Some(left_leaf)) = (left_dirty, left_id, left.as_ref()) {
                self.write_leaf(id, left_leaf)?;
            }
            if let (true, Some(id), Some(right_leaf)) = (right_dirty, right_id, right.as_ref()) {
                self.write_leaf(id, right_leaf)?;
            }
            self.write_leaf(leaf_id, &leaf)?;
            return self.write_internal(parent_id, &parent);
        }

        match (left_id, left) {
            (Some(survivor_id), Some(mut survivor)) => {
                survivor.entries.append(&mut leaf.entries);
                survivor.next = leaf.next;
                match (right_id, right.as_mut()) {
                    (Some(id), Some(right_leaf)) => {
                        right_leaf.prev = Some(survivor_id);
                        self.write_leaf(id, right_leaf)?;
                    }
                    _ => self.relink_prev(leaf.next, survivor_id)?,
                }
                self.write_leaf(survivor_id, &survivor)?;
                parent.keys.remove(idx - 1);
                parent.children.remove(idx);
                self.store.free(leaf_id)?;
                self.stats.inc_leaf_merges();
                tracing::trace!(
                    target: "clustered_bptree::merge",
                    survivor = survivor_id.0,
                    removed = leaf_id.0,
                    direction = "left",
                    "merged leaf into left sibling"
                );
            }
            _ => {
                let absorbed_id = right_id
                    .ok_or_else(|| BTreeError::Corruption("leaf without siblings".into()))?;
                let mut absorbed = match right {
                    Some(right_leaf) => right_leaf,
                    None => self.load_leaf(absorbed_id)?,
                };
                leaf.entries.append(&mut absorbed.entries);
                leaf.next = absorbed.next;
                self.relink_prev(absorbed.next, leaf_id)?;
                self.write_leaf(leaf_id, &leaf)?;
                parent.keys.remove(idx);
                parent.children.remove(idx + 1);
                self.store.free(absorbed_id)?;
                self.stats.inc_leaf_merges();
                tracing::trace!(
                    target: "clustered_bptree::merge",
                    survivor = leaf_id.0,
                    removed = absorbed_id.0,
                    direction = "right",
                    "merged right sibling into leaf"
                );
            }
        }
        self.rebalance_internal(path, parent_id, parent)
    }

    /// Restores internal occupancy after a child was dropped, collapsing the
    /// root when it is left with a single child.
    fn rebalance_internal(
        &mut self,
        mut path: Vec<PathEntry>,
        node_id: PageId,
        mut node: Internal<C>,
    ) -> Result<()> {
        let Some(parent_entry) = path.pop() else {
            if node.keys.is_empty() {
                let child = child_at(&node, 0)?;
                self.store.set_root(child)?;
                self.store.free(node_id)?;
                self.stats.inc_root_collapses();
                tracing::trace!(
                    target: "clustered_bptree::merge",
                    old_root = node_id.0,
                    new_root = child.0,
                    "collapsed root into its only child"
                );
                return Ok(());
            }
            return self.write_internal(node_id, &node);
        };
        let min = self.internal_min();
        if node.keys.len() >= min {
            return self.write_internal(node_id, &node);
        }

        let parent_id = parent_entry.page_id;
        let idx = parent_entry.child_index;
        let mut parent = self.load_internal(parent_id)?;
        let left_id = match idx.checked_sub(1) {
            Some(left_idx) => Some(child_at(&parent, left_idx)?),
            None => None,
        };
        let right_id = parent.children.get(idx + 1).copied();

        let mut left = left_id.map(|id| self.load_internal(id)).transpose()?;
        if let (Some(id), Some(left_node)) = (left_id, left.as_mut()) {
            if left_node.keys.len() > min {
                let (key, child) = pop_back(left_node)?;
                let separator = std::mem::replace(&mut parent.keys[idx - 1], key);
                node.keys.insert(0, separator);
                node.children.insert(0, child);
                self.write_internal(id, left_node)?;
                self.write_internal(node_id, &node)?;
                self.stats.inc_internal_borrows();
                tracing::trace!(
                    target: "clustered_bptree::borrow",
                    from = id.0,
                    into = node_id.0,
                    "rotated separator from left internal page"
                );
                return self.write_internal(parent_id, &parent);
            }
        }

        let mut right = right_id.map(|id| self.load_internal(id)).transpose()?;
        if let (Some(id), Some(right_node)) = (right_id, right.as_mut()) {
            if right_node.keys.len() > min {
                let (key, child) = pop_front(right_node)?;
                let separator = std::mem::replace(&mut parent.keys[idx], key);
                node.keys.push(separator);
                node.children.push(child);
                self.write_internal(id, right_node)?;
                self.write_internal(node_id, &node)?;
                self.stats.inc_internal_borrows();
                tracing::trace!(
                    target: "clustered_bptree::borrow",
                    from = id.0,
                    into = node_id.0,
                    "rotated separator from right internal page"
                );
                return self.write_internal(parent_id, &parent);
            }
        }

        match (left_id, left, right_id, right) {
            (Some(survivor_id), Some(mut survivor), _, _) => {
                survivor.keys.push(parent.keys.remove(idx - 1));
                parent.children.remove(idx);
                survivor.keys.append(&mut node.keys);
                survivor.children.append(&mut node.children);
                self.write_internal(survivor_id, &survivor)?;
                self.store.free(node_id)?;
                self.stats.inc_internal_merges();
                tracing::trace!(
                    target: "clustered_bptree::merge",
                    survivor = survivor_id.0,
                    removed = node_id.0,
                    direction = "left",
                    "merged internal page into left sibling"
                );
            }
            (_, _, Some(absorbed_id), Some(mut absorbed)) => {
                node.keys.push(parent.keys.remove(idx));
                parent.children.remove(idx + 1);
                node.keys.append(&mut absorbed.keys);
                node.children.append(&mut absorbed.children);
                self.write_internal(node_id, &node)?;
                self.store.free(absorbed_id)?;
                self.stats.inc_internal_merges();
                tracing::trace!(
                    target: "clustered_bptree::merge",
                    survivor = node_id.0,
                    removed = absorbed_id.0,
                    direction = "right",
                    "merged right sibling into internal page"
                );
            }
            _ => {
                return Err(BTreeError::Corruption(
                    "internal page without siblings".into(),
                ))
            }
        }
        self.rebalance_internal(path, parent_id, parent)
    }

    fn relink_prev(&mut self, leaf: Option<PageId>, prev: PageId) -> Result<()> {
        if let Some(id) = leaf {
            let mut next = self.load_leaf(id)?;
            next.prev = Some(prev);
            self.write_leaf(id, &next)?;
        }
        Ok(())
    }
}

/// Records a sibling of `sibling_len` can give a leaf of `len` without dropping below `min`.
fn spare(sibling_len: usize, min: usize, len: usize) -> usize {
    sibling_len
        .saturating_sub(min)
        .min(min.saturating_sub(len))
}

fn leading_key<K: Ord + Clone, R>(leaf: &LeafNode<K, R>) -> Result<K> {
    leaf.first_key()
        .cloned()
        .ok_or_else(|| BTreeError::Corruption("empty leaf after borrow".into()))
}

fn pop_back<K>(node: &mut InternalNode<K>) -> Result<(K, PageId)> {
    match (node.keys.pop(), node.children.pop()) {
        (Some(key), Some(child)) => Ok((key, child)),
        _ => Err(BTreeError::Corruption("internal page underflow".into())),
    }
}

fn pop_front<K>(node: &mut InternalNode<K>) -> Result<(K, PageId)> {
    if node.keys.is_empty() || node.children.is_empty() {
        return Err(BTreeError::Corruption("internal page underflow".into()));
    }
    Ok((node.keys.remove(0), node.children.remove(0)))
}
