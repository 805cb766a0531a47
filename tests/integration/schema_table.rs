#![allow(missing_docs)]

use clustered_bptree::{BTree, BTreeOptions, RecordCodec, Result, Row, Schema, Value};
use serde::Deserialize;
use tempfile::tempdir;

const TABLE_TOML: &str = r#"
[tree]
order = 4
leaf_capacity = 4

[tree.pager]
page_size = 1024
synchronous = "normal"

[schema]
key = "name"
fields = [
    { name = "id", kind = "int32" },
    { name = "name", kind = { char = 12 } },
    { name = "salary", kind = "float64" },
    { name = "hired", kind = "date" },
]
"#;

#[derive(Deserialize)]
struct TableConfig {
    tree: BTreeOptions,
    schema: Schema,
}

fn load() -> Result<TableConfig> {
    let config: TableConfig = toml::from_str(TABLE_TOML)
        .map_err(|err| clustered_bptree::BTreeError::Config(err.to_string()))?;
    config.tree.validate()?;
    Ok(config)
}

fn employee(id: i64, name: &str, salary: f64, hired: &str) -> Row {
    Row(vec![
        Value::Int(id),
        name.into(),
        Value::Float(salary),
        hired.into(),
    ])
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|row| match &row.0[1] {
            Value::Text(name) => name.clone(),
            other => panic!("name column held {other:?}"),
        })
        .collect()
}

const STAFF: [(&str, f64, &str); 10] = [
    ("mara", 4100.0, "2019-03-01"),
    ("ines", 3900.5, "2020-07-15"),
    ("bruno", 5200.0, "2018-01-09"),
    ("lucia", 4800.0, "2021-11-30"),
    ("diego", 3100.0, "2022-05-02"),
    ("ana", 6100.0, "2017-08-21"),
    ("tomas", 2900.0, "2023-02-14"),
    ("carla", 4500.0, "2016-12-05"),
    ("pedro", 3700.0, "2020-01-20"),
    ("ines", 4000.0, "2024-06-06"),
];

fn populated(path: &std::path::Path) -> Result<BTree<Schema>> {
    let config = load()?;
    let mut tree = BTree::open(path, config.schema, config.tree)?;
    for (id, (name, salary, hired)) in STAFF.iter().enumerate() {
        tree.insert(employee(id as i64, name, *salary, hired))?;
    }
    Ok(tree)
}

#[test]
fn config_file_drives_tree_and_schema() -> Result<()> {
    let config = load()?;
    assert_eq!(config.tree.order, 4);
    assert_eq!(config.tree.pager.page_size, 1024);
    assert_eq!(config.schema.record_size(), 4 + 12 + 8 + 10);
    assert_eq!(config.schema.key_field().name, "name");

    let dir = tempdir()?;
    let tree = BTree::open(dir.path().join("cfg.db"), config.schema, config.tree)?;
    assert_eq!(tree.block_factor(), 4);
    assert_eq!(tree.order(), 4);
    Ok(())
}

#[test]
fn text_keys_cluster_rows_alphabetically() -> Result<()> {
    let dir = tempdir()?;
    let tree = populated(&dir.path().join("staff.db"))?;
    let all: Vec<Row> = tree.iter_all()?.collect::<Result<_>>()?;
    assert_eq!(
        names(&all),
        vec![
            "ana", "bruno", "carla", "diego", "ines", "ines", "lucia", "mara", "pedro", "tomas"
        ]
    );

    let ines = tree.search(&"ines".into())?;
    assert_eq!(ines.len(), 2);
    assert_eq!(ines[0].0[0], Value::Int(1));
    assert_eq!(ines[1].0[0], Value::Int(9));
    assert_eq!(ines[1].0[3], Value::Text("2024-06-06".into()));

    let window: Vec<Row> = tree
        .range_search(&"c".into(), &"m".into())?
        .collect::<Result<_>>()?;
    assert_eq!(names(&window), vec!["carla", "diego", "ines", "ines", "lucia"]);
    tree.verify()?;
    Ok(())
}

#[test]
fn removing_first_duplicate_keeps_the_later_one() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = populated(&dir.path().join("dups.db"))?;
    assert_eq!(tree.remove(&"ines".into(), true)?, 1);
    let left = tree.search(&"ines".into())?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].0[2], Value::Float(4000.0));

    assert_eq!(tree.remove(&"ines".into(), false)?, 1);
    assert!(tree.search(&"ines".into())?.is_empty());
    assert_eq!(tree.verify()?.records, 8);
    Ok(())
}

#[test]
fn overlong_names_are_cut_to_the_column_width() -> Result<()> {
    let dir = tempdir()?;
    let mut tree = populated(&dir.path().join("long.db"))?;
    tree.insert(employee(99, "maximiliano-de-la-cruz", 1.0, "2025-01-01"))?;
    let found = tree.search(&"maximiliano-".into())?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0[0], Value::Int(99));
    Ok(())
}

#[test]
fn rows_reload_after_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("reload.db");
    populated(&path)?.close()?;

    let config = load()?;
    let tree = BTree::open(&path, config.schema, config.tree)?;
    let bruno = tree.search(&"bruno".into())?;
    assert_eq!(
        bruno,
        vec![employee(2, "bruno", 5200.0, "2018-01-09")]
    );
    assert_eq!(tree.verify()?.records, 10);
    Ok(())
}
