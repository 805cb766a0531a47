use std::vec;

use super::codec::RecordCodec;
use super::page::LeafEntry;
use super::tree::{BTree, Leaf};
use crate::types::{PageId, Result};

/// Lazy ascending scan over the leaf chain.
///
/// Holds the remaining entries of one leaf and loads the next leaf only when
/// they run out. Stops at the first key above the upper bound, or at the end
/// of the chain for an unbounded scan.
pub struct RangeIter<'a, C: RecordCodec> {
    tree: &'a BTree<C>,
    entries: vec::IntoIter<LeafEntry<C::Key, C::Record>>,
    next_leaf: Option<PageId>,
    hi: Option<C::Key>,
    done: bool,
}

impl<'a, C: RecordCodec> RangeIter<'a, C> {
    pub(crate) fn new(tree: &'a BTree<C>, leaf: Leaf<C>, start: usize, hi: Option<C::Key>) -> Self {
        let mut entries = leaf.entries;
        entries.drain(..start.min(entries.len()));
        Self {
            tree,
            entries: entries.into_iter(),
            next_leaf: leaf.next,
            hi,
            done: false,
        }
    }

    pub(crate) fn empty(tree: &'a BTree<C>) -> Self {
        Self {
            tree,
            entries: Vec::new().into_iter(),
            next_leaf: None,
            hi: None,
            done: true,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.next_leaf = None;
    }

    fn above_hi(&self, key: &C::Key) -> bool {
        self.hi.as_ref().is_some_and(|hi| key > hi)
    }
}

impl<C: RecordCodec> Iterator for RangeIter<'_, C> {
    type Item = Result<C::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(entry) = self.entries.next() {
                if self.above_hi(&entry.key) {
                    self.finish();
                    return None;
                }
                return Some(Ok(entry.record));
            }
            let Some(next_id) = self.next_leaf.take() else {
                self.finish();
                return None;
            };
            match self.tree.load_leaf(next_id) {
                Ok(leaf) => {
                    // Empty leaves are skipped rather than ending the scan.
                    if leaf.first_key().is_some_and(|first| self.above_hi(first)) {
                        self.finish();
                        return None;
                    }
                    self.next_leaf = leaf.next;
                    self.entries = leaf.entries.into_iter();
                }
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
