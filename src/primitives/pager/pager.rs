use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::meta::{Meta, META_LEN};
use crate::primitives::io::{self, FileIo};
use crate::types::{BTreeError, PageId, Result};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;
/// Smallest page size accepted by [`PagerOptions::validate`].
pub const MIN_PAGE_SIZE: u32 = 128;

/// Durability level applied after each write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    /// `fsync` after every page and header write.
    Full,
    /// Hand writes to the OS; no user-space buffering either way.
    #[default]
    Normal,
}

/// Configuration knobs for the page store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerOptions {
    /// Size of every page, including the header page.
    pub page_size: u32,
    /// Sync policy for writes.
    pub synchronous: Synchronous,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            synchronous: Synchronous::Normal,
        }
    }
}

impl PagerOptions {
    /// Rejects page sizes too small to hold the header.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(BTreeError::Invalid("page size below minimum"));
        }
        Ok(())
    }
}

/// Snapshot of page store I/O counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PagerStats {
    /// Pages read, header excluded.
    pub page_reads: u64,
    /// Pages written, header writes included.
    pub page_writes: u64,
    /// Bytes read from the file.
    pub bytes_read: u64,
    /// Bytes written to the file.
    pub bytes_written: u64,
    /// Calls to [`PageStore::allocate`].
    pub allocations: u64,
    /// Allocations satisfied from the free list.
    pub reused: u64,
    /// Calls to [`PageStore::free`].
    pub frees: u64,
}

#[derive(Default)]
struct StatCounters {
    page_reads: AtomicU64,
    page_writes: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    allocations: AtomicU64,
    reused: AtomicU64,
    frees: AtomicU64,
}

impl StatCounters {
    fn record_read(&self, bytes: usize) {
        self.page_reads.fetch_add(1, AtomicOrdering::Relaxed);
        self.bytes_read
            .fetch_add(bytes as u64, AtomicOrdering::Relaxed);
    }

    fn record_write(&self, bytes: usize) {
        self.page_writes.fetch_add(1, AtomicOrdering::Relaxed);
        self.bytes_written
            .fetch_add(bytes as u64, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> PagerStats {
        PagerStats {
            page_reads: self.page_reads.load(AtomicOrdering::Relaxed),
            page_writes: self.page_writes.load(AtomicOrdering::Relaxed),
            bytes_read: self.bytes_read.load(AtomicOrdering::Relaxed),
            bytes_written: self.bytes_written.load(AtomicOrdering::Relaxed),
            allocations: self.allocations.load(AtomicOrdering::Relaxed),
            reused: self.reused.load(AtomicOrdering::Relaxed),
            frees: self.frees.load(AtomicOrdering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.page_reads,
            &self.page_writes,
            &self.bytes_read,
            &self.bytes_written,
            &self.allocations,
            &self.reused,
            &self.frees,
        ] {
            counter.store(0, AtomicOrdering::Relaxed);
        }
    }
}

/// Fixed-size page file with a header page and an embedded free list.
///
/// Every mutation is written through before the call returns; there is no
/// page cache. Freed pages carry the id of the next free page in their first
/// eight bytes.
pub struct PageStore {
    io: Box<dyn FileIo>,
    meta: Meta,
    page_size: usize,
    options: PagerOptions,
    stats: StatCounters,
}

impl PageStore {
    /// Opens the page file at `path`, creating and initializing it when absent or empty.
    pub fn open(path: impl AsRef<Path>, options: PagerOptions) -> Result<Self> {
        let path = path.as_ref();
        let io = io::open_rw(path)?;
        let store = Self::open_with_io(Box::new(io), options)?;
        debug!(
            path = %path.display(),
            page_count = store.meta.page_count,
            root = store.meta.root.0,
            "pager.open"
        );
        Ok(store)
    }

    /// Opens a page store over an arbitrary [`FileIo`] backend.
    pub fn open_with_io(io: Box<dyn FileIo>, options: PagerOptions) -> Result<Self> {
        options.validate()?;
        let page_size = options.page_size as usize;
        let meta = if io.is_empty()? {
            let meta = Meta::new(options.page_size);
            debug!(page_size, "pager.create");
            meta
        } else {
            let mut prefix = [0u8; META_LEN];
            io.read_at(0, &mut prefix).map_err(|err| match err {
                BTreeError::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    BTreeError::CorruptHeader("header truncated")
                }
                other => other,
            })?;
            let meta = Meta::decode(&prefix)?;
            if meta.page_size != 0 && meta.page_size != options.page_size {
                return Err(BTreeError::CorruptHeader("page size mismatch"));
            }
            meta
        };
        let mut store = Self {
            io,
            meta,
            page_size,
            options,
            stats: StatCounters::default(),
        };
        if store.meta.page_size == 0 {
            store.meta.page_size = store.options.page_size;
        }
        store.flush_meta()?;
        Ok(store)
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages ever allocated, including the header page.
    pub fn page_count(&self) -> u64 {
        self.meta.page_count
    }

    /// Returns the head of the free list.
    pub fn free_head(&self) -> Option<PageId> {
        self.meta.free_head.non_null()
    }

    /// Returns the root page recorded in the header (`PageId(0)` when unset).
    pub fn root(&self) -> PageId {
        self.meta.root
    }

    /// Records a new root page and flushes the header.
    pub fn set_root(&mut self, root: PageId) -> Result<()> {
        self.check_data_page(root)?;
        self.meta.root = root;
        self.flush_meta()
    }

    /// Returns the header contents.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Binds the file to `record_size`, failing when it was created for another width.
    pub fn bind_record_size(&mut self, record_size: usize) -> Result<()> {
        let size = u32::try_from(record_size)
            .map_err(|_| BTreeError::Invalid("record size exceeds u32"))?;
        match self.meta.record_size {
            0 => {
                self.meta.record_size = size;
                self.flush_meta()
            }
            bound if bound == size => Ok(()),
            _ => Err(BTreeError::CorruptHeader("record size mismatch")),
        }
    }

    /// Allocates a page, reusing the free-list head when one exists.
    pub fn allocate(&mut self) -> Result<PageId> {
        self.stats.allocations.fetch_add(1, AtomicOrdering::Relaxed);
        let page_id = match self.meta.free_head.non_null() {
            Some(head) => {
                let next = self.free_next(head)?;
                if next == Some(head) {
                    return Err(BTreeError::Corruption(format!(
                        "free list page {head} points at itself"
                    )));
                }
                self.meta.free_head = next.unwrap_or_default();
                self.stats.reused.fetch_add(1, AtomicOrdering::Relaxed);
                head
            }
            None => {
                let page_id = PageId(self.meta.page_count);
                let zeroes = vec![0u8; self.page_size];
                self.write_raw(page_id, &zeroes)?;
                self.meta.page_count += 1;
                page_id
            }
        };
        self.flush_meta()?;
        trace!(page = page_id.0, free_head = self.meta.free_head.0, "pager.allocate");
        Ok(page_id)
    }

    /// Returns `page_id` to the free list.
    pub fn free(&mut self, page_id: PageId) -> Result<()> {
        self.check_data_page(page_id)?;
        if page_id == self.meta.root {
            return Err(BTreeError::Invalid("cannot free the root page"));
        }
        if page_id == self.meta.free_head {
            return Err(BTreeError::Invalid("page is already the free-list head"));
        }
        let mut page = vec![0u8; self.page_size];
        page[..8].copy_from_slice(&self.meta.free_head.0.to_le_bytes());
        self.write_raw(page_id, &page)?;
        self.meta.free_head = page_id;
        self.stats.frees.fetch_add(1, AtomicOrdering::Relaxed);
        self.flush_meta()?;
        trace!(page = page_id.0, "pager.free");
        Ok(())
    }

    /// Reads the next-free pointer stored in the first bytes of free page `page_id`.
    pub fn free_next(&self, page_id: PageId) -> Result<Option<PageId>> {
        let page = self.read(page_id)?;
        let mut next = [0u8; 8];
        next.copy_from_slice(&page[..8]);
        let next = PageId(u64::from_le_bytes(next));
        if next.0 >= self.meta.page_count {
            return Err(BTreeError::Corruption(format!(
                "free list pointer {} out of range (page_count={})",
                next.0, self.meta.page_count
            )));
        }
        Ok(next.non_null())
    }

    /// Reads a full page.
    pub fn read(&self, page_id: PageId) -> Result<Vec<u8>> {
        self.check_data_page(page_id)?;
        let mut buf = vec![0u8; self.page_size];
        self.io.read_at(self.offset(page_id), &mut buf)?;
        self.stats.record_read(buf.len());
        Ok(buf)
    }

    /// Writes `data` to a page, zero padding it to the page size.
    pub fn write(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_data_page(page_id)?;
        if data.len() > self.page_size {
            return Err(BTreeError::PageOverflow {
                len: data.len(),
                page_size: self.page_size,
            });
        }
        if data.len() == self.page_size {
            return self.write_raw(page_id, data);
        }
        let mut page = vec![0u8; self.page_size];
        page[..data.len()].copy_from_slice(data);
        self.write_raw(page_id, &page)
    }

    /// Returns a snapshot of the I/O counters.
    pub fn stats(&self) -> PagerStats {
        self.stats.snapshot()
    }

    /// Zeroes the I/O counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Flushes the header and syncs the file, consuming the store.
    pub fn close(mut self) -> Result<()> {
        self.flush_meta()?;
        self.io.sync_all()?;
        debug!(page_count = self.meta.page_count, "pager.close");
        Ok(())
    }

    fn offset(&self, page_id: PageId) -> u64 {
        page_id.0 * self.page_size as u64
    }

    fn check_data_page(&self, page_id: PageId) -> Result<()> {
        if page_id.is_null() {
            return Err(BTreeError::Invalid("header page is not addressable"));
        }
        if page_id.0 >= self.meta.page_count {
            return Err(BTreeError::Invalid("page id out of range"));
        }
        Ok(())
    }

    fn write_raw(&mut self, page_id: PageId, page: &[u8]) -> Result<()> {
        self.io.write_at(self.offset(page_id), page)?;
        self.stats.record_write(page.len());
        if self.options.synchronous == Synchronous::Full {
            self.io.sync_all()?;
        }
        Ok(())
    }

    fn flush_meta(&mut self) -> Result<()> {
        let mut page = vec![0u8; self.page_size];
        self.meta.encode(&mut page)?;
        self.io.write_at(0, &page)?;
        self.stats.record_write(page.len());
        if self.options.synchronous == Synchronous::Full {
            self.io.sync_all()?;
        }
        Ok(())
    }
}
