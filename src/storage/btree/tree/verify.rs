use std::collections::HashSet;

use super::{BTree, MAX_DEPTH};
use crate::storage::btree::codec::RecordCodec;
use crate::storage::btree::page::Node;
use crate::types::{BTreeError, PageId, Result};

/// Summary of a successful structural check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Levels from root to leaves.
    pub height: usize,
    /// Leaf pages reachable from the root.
    pub leaf_pages: u64,
    /// Internal pages reachable from the root.
    pub internal_pages: u64,
    /// Pages on the free list.
    pub free_pages: u64,
    /// Records stored across all leaves.
    pub records: u64,
}

struct Walk<K> {
    seen: HashSet<PageId>,
    leaves: Vec<(PageId, Option<PageId>, Option<PageId>, Option<K>, Option<K>)>,
    leaf_depth: Option<usize>,
    report: VerifyReport,
}

fn corrupt(msg: impl Into<String>) -> BTreeError {
    BTreeError::Corruption(msg.into())
}

impl<C: RecordCodec> BTree<C> {
    /// Walks every reachable page and the free list, checking ordering,
    /// occupancy, uniform leaf depth and leaf links, and that every page of
    /// the file is accounted for exactly once.
    pub fn verify(&self) -> Result<VerifyReport> {
        let mut walk = Walk {
            seen: HashSet::new(),
            leaves: Vec::new(),
            leaf_depth: None,
            report: VerifyReport::default(),
        };
        let root = self.store.root();
        self.walk_page(&mut walk, root, 1, None, None)?;
        walk.report.height = walk.leaf_depth.unwrap_or(1);

        let mut expected_prev = None;
        let mut last_key: Option<&C::Key> = None;
        for (i, (id, prev, next, first, last)) in walk.leaves.iter().enumerate() {
            if *prev != expected_prev {
                return Err(corrupt(format!("leaf {id} has wrong prev link")));
            }
            let expected_next = walk.leaves.get(i + 1).map(|leaf| leaf.0);
            if *next != expected_next {
                return Err(corrupt(format!("leaf {id} has wrong next link")));
            }
            if let (Some(before), Some(first)) = (last_key, first.as_ref()) {
                if first < before {
                    return Err(corrupt(format!("leaf {id} sorts below its predecessor")));
                }
            }
            last_key = last.as_ref().or(last_key);
            expected_prev = Some(*id);
        }

        let page_count = self.store.page_count();
        let mut free = HashSet::new();
        let mut cursor = self.store.free_head();
        while let Some(id) = cursor {
            if id.is_null() || id.0 >= page_count {
                return Err(corrupt(format!("free page {id} out of range")));
            }
            if walk.seen.contains(&id) {
                return Err(corrupt(format!("free page {id} is still in the tree")));
            }
            if !free.insert(id) {
                return Err(corrupt(format!("free list cycles at page {id}")));
            }
            cursor = self.store.free_next(id)?;
        }
        walk.report.free_pages = free.len() as u64;

        let accounted = walk.seen.len() as u64 + walk.report.free_pages + 1;
        if accounted != page_count {
            return Err(corrupt(format!(
                "{accounted} pages accounted for but file has {page_count}"
            )));
        }
        Ok(walk.report)
    }

    fn walk_page(
        &self,
        walk: &mut Walk<C::Key>,
        page_id: PageId,
        depth: usize,
        lower: Option<&C::Key>,
        upper: Option<&C::Key>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(corrupt("tree deeper than maximum"));
        }
        if !walk.seen.insert(page_id) {
            return Err(corrupt(format!("page {page_id} reachable twice")));
        }
        let is_root = depth == 1;
        match self.load(page_id)? {
            Node::Leaf(leaf) => {
                match walk.leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(corrupt(format!("leaf {page_id} at uneven depth")));
                    }
                    _ => walk.leaf_depth = Some(depth),
                }
                if !is_root && leaf.entries.len() < self.leaf_min() {
                    return Err(corrupt(format!("leaf {page_id} underfull")));
                }
                if leaf.entries.windows(2).any(|pair| pair[0].key > pair[1].key) {
                    return Err(corrupt(format!("leaf {page_id} out of order")));
                }
                for entry in &leaf.entries {
                    check_bounds(&entry.key, lower, upper, page_id)?;
                }
                walk.report.leaf_pages += 1;
                walk.report.records += leaf.entries.len() as u64;
                let first = leaf.entries.first().map(|entry| entry.key.clone());
                let last = leaf.entries.last().map(|entry| entry.key.clone());
                walk.leaves.push((page_id, leaf.prev, leaf.next, first, last));
            }
            Node::Internal(node) => {
                if node.keys.is_empty() {
                    return Err(corrupt(format!("internal page {page_id} has no keys")));
                }
                if !is_root && node.keys.len() < self.internal_min() {
                    return Err(corrupt(format!("internal page {page_id} underfull")));
                }
                if node.keys.windows(2).any(|pair| pair[0] > pair[1]) {
                    return Err(corrupt(format!("internal page {page_id} out of order")));
                }
                for key in &node.keys {
                    check_bounds(key, lower, upper, page_id)?;
                }
                walk.report.internal_pages += 1;
                for (i, child) in node.children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { node.keys.get(i - 1) };
                    let child_upper = node.keys.get(i).or(upper);
                    self.walk_page(walk, *child, depth + 1, child_lower, child_upper)?;
                }
            }
        }
        Ok(())
    }
}

fn check_bounds<K: Ord>(key: &K, lower: Option<&K>, upper: Option<&K>, page_id: PageId) -> Result<()> {
    if lower.is_some_and(|lo| key < lo) || upper.is_some_and(|hi| key > hi) {
        return Err(corrupt(format!("page {page_id} holds a key outside its separators")));
    }
    Ok(())
}
