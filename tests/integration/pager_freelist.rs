#![allow(missing_docs)]

use std::collections::HashSet;

use clustered_bptree::primitives::pager::{Meta, PageStore, PagerOptions, Synchronous, META_LEN};
use clustered_bptree::{BTreeError, PageId, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

fn options() -> PagerOptions {
    PagerOptions {
        page_size: 512,
        synchronous: Synchronous::Normal,
    }
}

#[test]
fn free_list_survives_reopen_and_drains_before_growth() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("freelist.db");
    let mut freed = Vec::new();
    {
        let mut store = PageStore::open(&path, options())?;
        let pages: Vec<PageId> = (0..16).map(|_| store.allocate()).collect::<Result<_>>()?;
        store.set_root(pages[0])?;
        for page in pages.iter().skip(1).step_by(2) {
            store.free(*page)?;
            freed.push(*page);
        }
        store.close()?;
    }

    let mut store = PageStore::open(&path, options())?;
    assert_eq!(store.page_count(), 17);
    assert_eq!(store.root(), PageId(1));

    let mut reused = Vec::new();
    for _ in 0..freed.len() {
        reused.push(store.allocate()?);
    }
    freed.reverse();
    assert_eq!(reused, freed);
    assert_eq!(store.page_count(), 17);
    assert_eq!(store.free_head(), None);
    assert_eq!(store.allocate()?, PageId(17));
    Ok(())
}

#[test]
fn random_churn_never_hands_out_a_live_page() -> Result<()> {
    let dir = tempdir()?;
    let mut store = PageStore::open(dir.path().join("churn.db"), options())?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut live: Vec<PageId> = Vec::new();
    let mut free: HashSet<PageId> = HashSet::new();

    for round in 0..50 {
        for _ in 0..8 {
            let page = store.allocate()?;
            assert!(!live.contains(&page), "round {round}: {page} handed out twice");
            free.remove(&page);
            live.push(page);
        }
        live.shuffle(&mut rng);
        for page in live.drain(..5) {
            store.free(page)?;
            free.insert(page);
        }
        let mut walked = HashSet::new();
        let mut cursor = store.free_head();
        while let Some(page) = cursor {
            assert!(walked.insert(page), "cycle at {page}");
            cursor = store.free_next(page)?;
        }
        assert_eq!(walked, free);
        assert_eq!(store.page_count(), 1 + (live.len() + free.len()) as u64);
    }
    Ok(())
}

#[test]
fn header_is_little_endian_at_fixed_offsets() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("header.db");
    {
        let mut store = PageStore::open(&path, options())?;
        let root = store.allocate()?;
        let spare = store.allocate()?;
        store.set_root(root)?;
        store.free(spare)?;
        store.close()?;
    }
    let bytes = std::fs::read(&path)?;
    assert_eq!(bytes.len(), 3 * 512);
    assert_eq!(&bytes[..8], b"BPTCFS1\0");
    assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
    assert_eq!(&bytes[12..20], &1u64.to_le_bytes());
    assert_eq!(&bytes[20..28], &2u64.to_le_bytes());
    assert_eq!(&bytes[28..36], &3u64.to_le_bytes());
    assert!(bytes[META_LEN..512].iter().all(|&b| b == 0));

    let meta = Meta::decode(&bytes[..META_LEN])?;
    assert_eq!(meta.root, PageId(1));
    assert_eq!(meta.free_head, PageId(2));
    assert_eq!(meta.page_count, 3);
    Ok(())
}

#[test]
fn full_synchronous_mode_round_trips() -> Result<()> {
    let dir = tempdir()?;
    let mut store = PageStore::open(
        dir.path().join("full.db"),
        PagerOptions {
            synchronous: Synchronous::Full,
            ..options()
        },
    )?;
    let page = store.allocate()?;
    store.write(page, &[7u8; 512])?;
    assert_eq!(store.read(page)?, vec![7u8; 512]);
    assert!(matches!(
        store.write(page, &[0u8; 513]),
        Err(BTreeError::PageOverflow { .. })
    ));
    Ok(())
}

#[test]
fn root_page_cannot_be_freed() -> Result<()> {
    let dir = tempdir()?;
    let mut store = PageStore::open(dir.path().join("root.db"), options())?;
    let root = store.allocate()?;
    store.set_root(root)?;
    assert!(matches!(store.free(root), Err(BTreeError::Invalid(_))));
    assert!(matches!(
        store.set_root(PageId(99)),
        Err(BTreeError::Invalid(_))
    ));
    Ok(())
}
