//! Referential-integrity checks across the tables of a group.

use csvw_metadata::{MetadataError, TableGroup};
use serde_json::json;

fn metadata() -> serde_json::Value {
    json!({
        "dialect": {"header": false},
        "tables": [
            {
                "url": "a.csv",
                "tableSchema": {
                    "columns": [{"name": "id"}, {"name": "b_id"}],
                    "foreignKeys": [{
                        "columnReference": "b_id",
                        "reference": {"resource": "b.csv", "columnReference": "id"},
                    }],
                },
            },
            {
                "url": "b.csv",
                "tableSchema": {
                    "columns": [{"name": "id"}, {"name": "label"}],
                    "primaryKey": "id",
                },
            },
        ],
    })
}

fn make_group(dir: &tempfile::TempDir, a: &str, b: &str) -> TableGroup {
    let md_path = dir.path().join("md.json");
    std::fs::write(&md_path, serde_json::to_string(&metadata()).unwrap()).unwrap();
    std::fs::write(dir.path().join("a.csv"), a).unwrap();
    std::fs::write(dir.path().join("b.csv"), b).unwrap();
    TableGroup::from_file(&md_path).unwrap()
}

#[test]
fn matching_keys_pass() {
    let dir = tempfile::tempdir().unwrap();
    let group = make_group(&dir, "1,x\n2,y\n", "x,ex\ny,why\n");
    group.check_referential_integrity().unwrap();
}

#[test]
fn missing_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let group = make_group(&dir, "1,x\n2,z\n", "x,ex\ny,why\n");
    let err = group.check_referential_integrity().unwrap_err();
    match err {
        MetadataError::KeyNotFound { key, table } => {
            assert_eq!(key, vec!["z"]);
            assert_eq!(table, "b.csv");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn composite_keys_compare_as_tuples() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = json!({
        "dialect": {"header": false},
        "tables": [
            {
                "url": "a.csv",
                "tableSchema": {
                    "columns": [{"name": "x"}, {"name": "y"}],
                    "foreignKeys": [{
                        "columnReference": ["x", "y"],
                        "reference": {"resource": "b.csv", "columnReference": ["x", "y"]},
                    }],
                },
            },
            {
                "url": "b.csv",
                "tableSchema": {"columns": [{"name": "x"}, {"name": "y"}]},
            },
        ],
    });
    let md_path = dir.path().join("md.json");
    std::fs::write(&md_path, serde_json::to_string(&metadata).unwrap()).unwrap();
    std::fs::write(dir.path().join("a.csv"), "1,2\n").unwrap();

    // The pair (1,2) only matches a row holding both values in order.
    std::fs::write(dir.path().join("b.csv"), "2,1\n").unwrap();
    let group = TableGroup::from_file(&md_path).unwrap();
    assert!(group.check_referential_integrity().is_err());

    std::fs::write(dir.path().join("b.csv"), "1,2\n").unwrap();
    let group = TableGroup::from_file(&md_path).unwrap();
    group.check_referential_integrity().unwrap();
}

#[test]
fn unknown_referenced_table_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = json!({
        "dialect": {"header": false},
        "tables": [{
            "url": "a.csv",
            "tableSchema": {
                "columns": [{"name": "id"}],
                "foreignKeys": [{
                    "columnReference": "id",
                    "reference": {"resource": "missing.csv", "columnReference": "id"},
                }],
            },
        }],
    });
    let md_path = dir.path().join("md.json");
    std::fs::write(&md_path, serde_json::to_string(&metadata).unwrap()).unwrap();
    std::fs::write(dir.path().join("a.csv"), "1\n").unwrap();
    let group = TableGroup::from_file(&md_path).unwrap();
    assert!(matches!(
        group.check_referential_integrity(),
        Err(MetadataError::InvalidDescription { .. })
    ));
}
