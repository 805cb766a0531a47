#![forbid(unsafe_code)]

//! Fixed-size page file: header page, positional page I/O and the free list.

mod meta;
mod pager;

pub use meta::{Meta, FORMAT_VERSION, MAGIC, META_LEN};
pub use pager::{
    PageStore, PagerOptions, PagerStats, Synchronous, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE,
};
