use std::ops::Range;

use crate::types::{BTreeError, PageId, Result};

/// Magic bytes identifying a clustered B+Tree page file.
pub const MAGIC: [u8; 8] = *b"BPTCFS1\0";
/// On-disk format version understood by this crate.
pub const FORMAT_VERSION: u32 = 1;
/// Number of header bytes carrying data; the rest of page 0 is zero.
pub const META_LEN: usize = 44;

const META_MAGIC: Range<usize> = 0..8;
const META_VERSION: Range<usize> = 8..12;
const META_ROOT: Range<usize> = 12..20;
const META_FREE_HEAD: Range<usize> = 20..28;
const META_PAGE_COUNT: Range<usize> = 28..36;
const META_PAGE_SIZE: Range<usize> = 36..40;
const META_RECORD_SIZE: Range<usize> = 40..44;

/// Header page contents.
///
/// `page_size` and `record_size` live in what older files left as padding;
/// a zero there means "not recorded".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Meta {
    /// Format version number.
    pub version: u32,
    /// Root page of the tree, `PageId(0)` while no tree exists.
    pub root: PageId,
    /// Head of the free-page chain, `PageId(0)` when empty.
    pub free_head: PageId,
    /// Pages ever allocated, header and free pages included.
    pub page_count: u64,
    /// Page size the file was created with.
    pub page_size: u32,
    /// Fixed record width bound to this file.
    pub record_size: u32,
}

impl Meta {
    /// Header of a freshly created file.
    pub fn new(page_size: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            root: PageId(0),
            free_head: PageId(0),
            page_count: 1,
            page_size,
            record_size: 0,
        }
    }

    /// Encodes the header into `buf`, zero filling everything past [`META_LEN`].
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < META_LEN {
            return Err(BTreeError::Invalid("meta buffer too small"));
        }
        buf.fill(0);
        buf[META_MAGIC].copy_from_slice(&MAGIC);
        buf[META_VERSION].copy_from_slice(&self.version.to_le_bytes());
        buf[META_ROOT].copy_from_slice(&self.root.0.to_le_bytes());
        buf[META_FREE_HEAD].copy_from_slice(&self.free_head.0.to_le_bytes());
        buf[META_PAGE_COUNT].copy_from_slice(&self.page_count.to_le_bytes());
        buf[META_PAGE_SIZE].copy_from_slice(&self.page_size.to_le_bytes());
        buf[META_RECORD_SIZE].copy_from_slice(&self.record_size.to_le_bytes());
        Ok(())
    }

    /// Decodes and validates a header prefix.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < META_LEN {
            return Err(BTreeError::CorruptHeader("header truncated"));
        }
        if buf[META_MAGIC] != MAGIC {
            return Err(BTreeError::CorruptHeader("bad magic"));
        }
        let version = u32::from_le_bytes(read_array(buf, META_VERSION));
        if version != FORMAT_VERSION {
            return Err(BTreeError::CorruptHeader("unsupported format version"));
        }
        let meta = Self {
            version,
            root: PageId(u64::from_le_bytes(read_array(buf, META_ROOT))),
            free_head: PageId(u64::from_le_bytes(read_array(buf, META_FREE_HEAD))),
            page_count: u64::from_le_bytes(read_array(buf, META_PAGE_COUNT)),
            page_size: u32::from_le_bytes(read_array(buf, META_PAGE_SIZE)),
            record_size: u32::from_le_bytes(read_array(buf, META_RECORD_SIZE)),
        };
        if meta.page_count == 0 {
            return Err(BTreeError::CorruptHeader("page count excludes header page"));
        }
        if meta.root.0 >= meta.page_count || meta.free_head.0 >= meta.page_count {
            return Err(BTreeError::CorruptHeader("header page id out of range"));
        }
        Ok(meta)
    }
}

fn read_array<const N: usize>(buf: &[u8], range: Range<usize>) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[range]);
    out
}
