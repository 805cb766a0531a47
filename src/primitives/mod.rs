//! Low-level primitives underneath the B+Tree.
//!
//! Includes positional file I/O and the paged file with its free list.

/// I/O abstractions over a single long-lived file handle.
pub mod io;

/// Page store: header page, page allocation and recycling.
pub mod pager;
