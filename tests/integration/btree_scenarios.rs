#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use clustered_bptree::{
    BTree, BTreeError, BTreeOptions, Field, FieldKind, Result, Row, Schema, Value,
};
use tempfile::tempdir;

fn schema() -> Result<Schema> {
    Schema::new(
        vec![
            Field::new("id", FieldKind::Int32),
            Field::new("label", FieldKind::Char(8)),
        ],
        "id",
    )
}

fn row(id: i64) -> Row {
    Row(vec![Value::Int(id), format!("row{id}").into()])
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.0[0] {
            Value::Int(id) => id,
            _ => panic!("id column is not an integer"),
        })
        .collect()
}

fn open(path: &Path) -> Result<BTree<Schema>> {
    BTree::open(path, schema()?, BTreeOptions::default().leaf_capacity(3))
}

fn scan(tree: &BTree<Schema>, lo: i64, hi: i64) -> Result<Vec<i64>> {
    let rows: Vec<Row> = tree
        .range_search(&Value::Int(lo), &Value::Int(hi))?
        .collect::<Result<_>>()?;
    Ok(ids(&rows))
}

#[test]
fn small_block_factor_scenario() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = open(&dir.path().join("scenario.db"))?;
    assert_eq!(tree.block_factor(), 3);

    for id in [10, 5, 20, 15, 8, 7, 30, 25, 40, 1, 2, 3, 4, 6, 9, 11, 12] {
        tree.insert(row(id))?;
    }
    tree.verify()?;

    assert_eq!(tree.search(&Value::Int(15))?, vec![row(15)]);
    assert_eq!(scan(&tree, 5, 12)?, vec![5, 6, 7, 8, 9, 10, 11, 12]);

    assert_eq!(tree.remove(&Value::Int(8), false)?, 1);
    assert_eq!(scan(&tree, 1, 12)?, vec![1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12]);

    let all: Vec<Row> = tree.iter_all()?.collect::<Result<_>>()?;
    assert_eq!(
        ids(&all),
        vec![1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12, 15, 20, 25, 30, 40]
    );
    tree.verify()?;
    Ok(())
}

#[test]
fn thousand_sequential_keys_minus_evens() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = open(&dir.path().join("sequential.db"))?;
    for id in 1..=1000 {
        tree.insert(row(id))?;
    }
    for id in (2..=1000).step_by(2) {
        assert_eq!(tree.remove(&Value::Int(id), false)?, 1);
    }
    let expected: Vec<i64> = (1..=1000).step_by(2).collect();
    assert_eq!(scan(&tree, i64::MIN, i64::MAX)?, expected);
    assert_eq!(tree.verify()?.records, 500);
    Ok(())
}

#[test]
fn inserting_then_removing_everything_leaves_an_empty_leaf_root() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = open(&dir.path().join("inverse.db"))?;
    for id in 0..300 {
        tree.insert(row(id % 37))?;
    }
    for id in 0..37 {
        let expected = (0..300).filter(|n| n % 37 == id).count();
        assert_eq!(tree.remove(&Value::Int(id), false)?, expected);
    }
    assert!(tree.is_empty()?);
    assert_eq!(tree.height()?, 1);
    let report = tree.verify()?;
    assert_eq!(report.leaf_pages, 1);
    assert_eq!(report.records, 0);
    Ok(())
}

#[test]
fn tree_survives_close_and_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("persist.db");
    let root = {
        let mut tree = open(&path)?;
        for id in (0..200).rev() {
            tree.insert(row(id))?;
        }
        for id in 50..100 {
            tree.remove(&Value::Int(id), true)?;
        }
        let root = tree.root_page();
        tree.close()?;
        root
    };

    let mut tree = open(&path)?;
    assert_eq!(tree.root_page(), root);
    assert_eq!(tree.search(&Value::Int(10))?, vec![row(10)]);
    assert!(tree.search(&Value::Int(75))?.is_empty());
    assert_eq!(tree.verify()?.records, 150);

    tree.insert(row(75))?;
    assert_eq!(scan(&tree, 74, 76)?, vec![75]);
    Ok(())
}

#[test]
fn reopening_with_another_record_size_is_corrupt_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bound.db");
    open(&path)?.close()?;

    let wider = Schema::new(
        vec![
            Field::new("id", FieldKind::Int64),
            Field::new("label", FieldKind::Char(8)),
        ],
        "id",
    )?;
    let err = BTree::open(&path, wider, BTreeOptions::default()).err();
    assert!(matches!(err, Some(BTreeError::CorruptHeader(_))), "{err:?}");
    Ok(())
}

#[test]
fn foreign_file_is_corrupt_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("foreign.db");
    fs::write(&path, vec![0xAB; 4096])?;
    let err = open(&path).err();
    assert!(matches!(err, Some(BTreeError::CorruptHeader(_))), "{err:?}");
    Ok(())
}

#[test]
fn absent_keys_are_empty_results_not_errors() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = open(&dir.path().join("absent.db"))?;
    assert!(tree.search(&Value::Int(1))?.is_empty());
    assert_eq!(tree.remove(&Value::Int(1), false)?, 0);
    for id in [3, 6, 9] {
        tree.insert(row(id))?;
    }
    assert!(scan(&tree, 4, 5)?.is_empty());
    assert!(scan(&tree, 9, 3)?.is_empty());
    Ok(())
}

#[test]
fn text_lookups_are_coerced_through_the_key_column() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = open(&dir.path().join("coerce.db"))?;
    tree.insert(Row(vec!["5".into(), "five".into()]))?;
    tree.insert(row(6))?;

    assert!(tree.search(&"5".into())?.is_empty());
    let key = tree.codec().key(&" 5 ".into())?;
    assert_eq!(key, Value::Int(5));
    let found = tree.search(&key)?;
    assert_eq!(found, vec![Row(vec![Value::Int(5), "five".into()])]);

    assert!(matches!(
        tree.codec().key(&"4.5".into()),
        Err(BTreeError::Codec(_))
    ));
    Ok(())
}

#[test]
fn wide_text_keys_fit_internal_pages_at_default_options() -> Result<()> {
    let dir = tempdir()?;
    let schema = Schema::new(vec![Field::new("name", FieldKind::Char(100))], "name")?;
    let mut tree = BTree::open(dir.path().join("wide.db"), schema, BTreeOptions::default())?;
    assert_eq!(tree.order(), 36);
    assert_eq!(tree.block_factor(), 40);

    let name = |i: usize| format!("{i:0>100}");
    for i in 0..3000 {
        tree.insert(Row(vec![name(i).into()]))?;
    }
    let report = tree.verify()?;
    assert_eq!(report.records, 3000);
    assert!(report.internal_pages > 1);
    assert_eq!(tree.search(&name(2999).into())?.len(), 1);

    for i in (0..3000).step_by(2) {
        assert_eq!(tree.remove(&name(i).into(), false)?, 1);
    }
    assert_eq!(tree.verify()?.records, 1500);
    Ok(())
}
