//! Leaf and internal page formats.
//!
//! Leaf pages hold packed fixed-size records behind a 13-byte header
//! (`tag`, `record_count: i32`, `prev_leaf: i32`, `next_leaf: i32`, all
//! little-endian). Internal pages hold length-prefixed separator keys followed
//! by `key_count + 1` child ids.

use super::codec::{KeyCodec, RecordCodec};
use crate::types::{BTreeError, PageId, Result};

/// Tag byte of a leaf page.
pub const LEAF_TAG: u8 = b'L';
/// Tag byte of an internal page.
pub const INTERNAL_TAG: u8 = b'I';
/// Leaf header length: tag, record count, prev and next links.
pub const LEAF_HEADER_LEN: usize = 13;
/// Internal header length: tag and key count.
pub const INTERNAL_HEADER_LEN: usize = 5;
/// Per-key length prefix inside an internal page.
pub const KEY_LEN_PREFIX: usize = 2;
/// Encoded width of one child pointer.
pub const CHILD_LEN: usize = 8;

/// Maximum records a leaf page can hold for `record_size`.
pub fn block_factor(page_size: usize, record_size: usize) -> usize {
    if record_size == 0 {
        return 1;
    }
    (page_size.saturating_sub(LEAF_HEADER_LEN) / record_size).max(1)
}

/// Bytes needed for an internal page with `keys` fixed-width keys of `key_len` bytes.
pub fn internal_page_len(keys: usize, key_len: usize) -> usize {
    INTERNAL_HEADER_LEN + keys * (KEY_LEN_PREFIX + key_len) + (keys + 1) * CHILD_LEN
}

/// Most separators of `key_len` bytes an internal page of `page_size` bytes holds.
pub fn max_order(page_size: usize, key_len: usize) -> usize {
    page_size.saturating_sub(INTERNAL_HEADER_LEN + CHILD_LEN) / (KEY_LEN_PREFIX + key_len + CHILD_LEN)
}

/// Longest key that still lets `order` separators share one internal page.
pub fn key_room(page_size: usize, order: usize) -> usize {
    let fixed = INTERNAL_HEADER_LEN + (order + 1) * CHILD_LEN + order * KEY_LEN_PREFIX;
    (page_size.saturating_sub(fixed) / order.max(1)).min(usize::from(u16::MAX))
}

/// A record together with its extracted key.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafEntry<K, R> {
    /// Clustering key of `record`.
    pub key: K,
    /// The record itself.
    pub record: R,
}

/// In-memory view of a leaf page.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafNode<K, R> {
    /// Records sorted non-decreasing by key.
    pub entries: Vec<LeafEntry<K, R>>,
    /// Previous leaf in key order.
    pub prev: Option<PageId>,
    /// Next leaf in key order.
    pub next: Option<PageId>,
}

impl<K: Ord, R> LeafNode<K, R> {
    /// An unlinked leaf without records.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            prev: None,
            next: None,
        }
    }

    /// First position whose key is `>= key`.
    pub fn lower_bound(&self, key: &K) -> usize {
        self.entries.partition_point(|entry| entry.key < *key)
    }

    /// First position whose key is `> key`.
    pub fn upper_bound(&self, key: &K) -> usize {
        self.entries.partition_point(|entry| entry.key <= *key)
    }

    /// Key of the first record, if any.
    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(|entry| &entry.key)
    }
}

/// In-memory view of an internal page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalNode<K> {
    /// Separator keys, sorted.
    pub keys: Vec<K>,
    /// Child page ids; always one more than `keys`.
    pub children: Vec<PageId>,
}

impl<K: Ord> InternalNode<K> {
    /// Child slot for a key, routing ties to the right.
    pub fn child_index_right(&self, key: &K) -> usize {
        self.keys.partition_point(|sep| sep <= key)
    }

    /// Child slot of the leftmost subtree that may hold `key`.
    pub fn child_index_left(&self, key: &K) -> usize {
        self.keys.partition_point(|sep| sep < key)
    }
}

/// A decoded tree page.
#[derive(Clone, Debug, PartialEq)]
pub enum Node<K, R> {
    /// Leaf page.
    Leaf(LeafNode<K, R>),
    /// Internal page.
    Internal(InternalNode<K>),
}

/// Serializes nodes to and from page buffers for one record codec.
pub struct NodeCodec<'a, C: RecordCodec> {
    codec: &'a C,
    page_size: usize,
    block_factor: usize,
    order: usize,
}

impl<'a, C: RecordCodec> NodeCodec<'a, C> {
    /// Binds the page geometry used for encoding and decoding.
    pub fn new(codec: &'a C, page_size: usize, block_factor: usize, order: usize) -> Self {
        Self {
            codec,
            page_size,
            block_factor,
            order,
        }
    }

    /// Decodes a page into a leaf or internal node.
    pub fn decode(&self, page: &[u8]) -> Result<Node<C::Key, C::Record>> {
        match page.first() {
            Some(&LEAF_TAG) => self.decode_leaf(page).map(Node::Leaf),
            Some(&INTERNAL_TAG) => self.decode_internal(page).map(Node::Internal),
            _ => Err(BTreeError::InvalidPage("unknown page tag")),
        }
    }

    /// Decodes a page that must be a leaf.
    pub fn decode_leaf(&self, page: &[u8]) -> Result<LeafNode<C::Key, C::Record>> {
        if page.len() < LEAF_HEADER_LEN || page[0] != LEAF_TAG {
            return Err(BTreeError::InvalidPage("not a leaf page"));
        }
        let count = read_i32(page, 1);
        let count = usize::try_from(count)
            .map_err(|_| BTreeError::InvalidPage("negative leaf record count"))?;
        let record_size = self.codec.record_size();
        if count > block_factor(self.page_size, record_size) {
            return Err(BTreeError::InvalidPage("leaf record count exceeds page capacity"));
        }
        let prev = decode_link(read_i32(page, 5))?;
        let next = decode_link(read_i32(page, 9))?;
        if LEAF_HEADER_LEN + count * record_size > page.len() {
            return Err(BTreeError::InvalidPage("leaf records exceed page"));
        }
        let mut entries = Vec::with_capacity(count);
        for chunk in page[LEAF_HEADER_LEN..]
            .chunks_exact(record_size)
            .take(count)
        {
            let record = self.codec.unpack(chunk)?;
            let key = self.codec.key_of(&record)?;
            entries.push(LeafEntry { key, record });
        }
        Ok(LeafNode {
            entries,
            prev,
            next,
        })
    }

    /// Decodes a page that must be an internal node.
    pub fn decode_internal(&self, page: &[u8]) -> Result<InternalNode<C::Key>> {
        if page.len() < INTERNAL_HEADER_LEN || page[0] != INTERNAL_TAG {
            return Err(BTreeError::InvalidPage("not an internal page"));
        }
        let key_count = u32::from_le_bytes([page[1], page[2], page[3], page[4]]) as usize;
        if internal_page_len(key_count, 0) > page.len() {
            return Err(BTreeError::InvalidPage("internal key count exceeds page"));
        }
        let mut off = INTERNAL_HEADER_LEN;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let len_bytes = page
                .get(off..off + KEY_LEN_PREFIX)
                .ok_or(BTreeError::InvalidPage("internal key prefix truncated"))?;
            let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
            off += KEY_LEN_PREFIX;
            let key_bytes = page
                .get(off..off + len)
                .ok_or(BTreeError::InvalidPage("internal key truncated"))?;
            keys.push(C::Key::decode_key(key_bytes)?);
            off += len;
        }
        let mut children = Vec::with_capacity(key_count + 1);
        for _ in 0..=key_count {
            let raw = page
                .get(off..off + CHILD_LEN)
                .ok_or(BTreeError::InvalidPage("internal children truncated"))?;
            let mut arr = [0u8; CHILD_LEN];
            arr.copy_from_slice(raw);
            let child = PageId(u64::from_le_bytes(arr));
            if child.is_null() {
                return Err(BTreeError::InvalidPage("internal child points at header"));
            }
            children.push(child);
            off += CHILD_LEN;
        }
        Ok(InternalNode { keys, children })
    }

    /// Encodes any node.
    pub fn encode(&self, node: &Node<C::Key, C::Record>) -> Result<Vec<u8>> {
        match node {
            Node::Leaf(leaf) => self.encode_leaf(leaf),
            Node::Internal(internal) => self.encode_internal(internal),
        }
    }

    /// Encodes a leaf into a full, zero-padded page.
    pub fn encode_leaf(&self, leaf: &LeafNode<C::Key, C::Record>) -> Result<Vec<u8>> {
        if leaf.entries.len() > self.block_factor {
            return Err(BTreeError::Overflow("leaf holds more records than block factor"));
        }
        let record_size = self.codec.record_size();
        let mut page = vec![0u8; self.page_size];
        page[0] = LEAF_TAG;
        write_i32(&mut page, 1, leaf.entries.len() as i32);
        write_i32(&mut page, 5, encode_link(leaf.prev)?);
        write_i32(&mut page, 9, encode_link(leaf.next)?);
        let mut off = LEAF_HEADER_LEN;
        for entry in &leaf.entries {
            let slot = page
                .get_mut(off..off + record_size)
                .ok_or(BTreeError::Overflow("leaf records exceed page"))?;
            self.codec.pack(&entry.record, slot)?;
            off += record_size;
        }
        Ok(page)
    }

    /// Encodes an internal node into a full, zero-padded page.
    pub fn encode_internal(&self, node: &InternalNode<C::Key>) -> Result<Vec<u8>> {
        if node.keys.len() > self.order {
            return Err(BTreeError::Overflow("internal node holds more keys than order"));
        }
        if node.children.len() != node.keys.len() + 1 {
            return Err(BTreeError::Overflow("internal node child count mismatch"));
        }
        let mut page = Vec::with_capacity(self.page_size);
        page.push(INTERNAL_TAG);
        page.extend_from_slice(&(node.keys.len() as u32).to_le_bytes());
        let mut key_buf = Vec::new();
        for key in &node.keys {
            key_buf.clear();
            key.encode_key(&mut key_buf);
            let len = u16::try_from(key_buf.len())
                .map_err(|_| BTreeError::Overflow("separator key longer than u16"))?;
            page.extend_from_slice(&len.to_le_bytes());
            page.extend_from_slice(&key_buf);
        }
        for child in &node.children {
            page.extend_from_slice(&child.0.to_le_bytes());
        }
        if page.len() > self.page_size {
            return Err(BTreeError::Overflow("internal node does not fit in one page"));
        }
        page.resize(self.page_size, 0);
        Ok(page)
    }
}

fn read_i32(page: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([page[off], page[off + 1], page[off + 2], page[off + 3]])
}

fn write_i32(page: &mut [u8], off: usize, value: i32) {
    page[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn decode_link(raw: i32) -> Result<Option<PageId>> {
    let id = u64::try_from(raw).map_err(|_| BTreeError::InvalidPage("negative leaf link"))?;
    Ok(PageId(id).non_null())
}

fn encode_link(link: Option<PageId>) -> Result<i32> {
    let id = link.map_or(0, |page| page.0);
    i32::try_from(id).map_err(|_| BTreeError::Overflow("leaf link exceeds i32"))
}
