//! Store-level properties exercised through the public library API.

use std::collections::HashSet;
use std::fs;

use dwap::cleaner::{CleanOptions, MissingStrategy};
use dwap::config::AppConfig;
use dwap::error::Error;
use dwap::store::{SqliteStore, Store, data_table_name};
use dwap::table::{Table, Value};
use dwap::types::NewDataset;
use dwap::workspace::{ImportRequest, Workspace};
use tempfile::TempDir;

fn store(temp: &TempDir) -> SqliteStore {
    let store = SqliteStore::new(temp.path().join("dwap.db")).unwrap();
    store.initialize().unwrap();
    store
}

fn meta(name: &str, owner: &str, tags: &[&str]) -> NewDataset {
    NewDataset {
        name: name.to_string(),
        owner_email: owner.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        file_type: "csv".to_string(),
        ..Default::default()
    }
}

fn mixed_table() -> Table {
    Table::new(
        vec!["id".into(), "score".into(), "label".into()],
        vec![
            vec![Value::Int(1), Value::Float(0.5), Value::Text("ä b".into())],
            vec![Value::Int(2), Value::Null, Value::Text("".into())],
            vec![Value::Int(-3), Value::Float(1e-9), Value::Null],
        ],
    )
    .unwrap()
}

#[test]
fn saved_tables_load_back_unchanged() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let tables = vec![
        mixed_table(),
        Table::new(vec!["only".into()], vec![]).unwrap(),
        Table::from_text_rows(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "x".into()], vec!["2".into(), "NA".into()]],
        ),
    ];

    for (i, table) in tables.iter().enumerate() {
        let id = store
            .save_dataset(table, &meta(&format!("t{i}"), "", &[]))
            .unwrap();
        let loaded = store.load_dataset(id).unwrap().unwrap();
        assert_eq!(loaded.headers(), table.headers());
        assert_eq!(loaded.rows(), table.rows());

        let record = store.get_dataset(id).unwrap().unwrap();
        assert_eq!(record.row_count, table.n_rows() as i64);
        assert_eq!(record.column_count, table.n_cols() as i64);
        assert_eq!(record.fingerprint, table.fingerprint().unwrap());
    }
}

#[test]
fn fingerprints_are_unique_across_records() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let table = mixed_table();

    store.save_dataset(&table, &meta("first", "", &[])).unwrap();
    let again = store.save_dataset(&table, &meta("second", "", &[]));
    assert!(matches!(again, Err(Error::DuplicateContent { existing_id: 1 })));

    let all = store.search_datasets("", "").unwrap();
    assert_eq!(all.len(), 1);
    let fingerprints: HashSet<String> = all
        .iter()
        .map(|d| store.get_dataset(d.id).unwrap().unwrap().fingerprint)
        .collect();
    assert_eq!(fingerprints.len(), all.len());
}

#[test]
fn delete_then_resave_same_content() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let table = mixed_table();

    let id = store.save_dataset(&table, &meta("a", "", &[])).unwrap();
    store
        .log_operation(id, "clean", &serde_json::json!({}), "")
        .unwrap();
    assert!(store.delete_dataset(id).unwrap());
    assert!(!store.delete_dataset(id).unwrap());
    assert!(store.load_dataset(id).unwrap().is_none());

    let fingerprint = table.fingerprint().unwrap();
    let physical = data_table_name(&fingerprint);
    let exists: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&physical],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 0);

    let new_id = store.save_dataset(&table, &meta("a", "", &[])).unwrap();
    assert_ne!(new_id, id);
    assert_eq!(store.load_dataset(new_id).unwrap().unwrap().rows(), table.rows());
    assert!(store.get_history(new_id).unwrap().is_empty());
}

#[test]
fn search_matches_fields_and_filters_owner() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let one = Table::new(vec!["v".into()], vec![vec![Value::Int(1)]]).unwrap();
    let two = Table::new(vec!["v".into()], vec![vec![Value::Int(2)]]).unwrap();
    let three = Table::new(vec!["v".into()], vec![vec![Value::Int(3)]]).unwrap();

    let a = store
        .save_dataset(&one, &meta("Quarterly Sales", "ana@example.com", &["finance"]))
        .unwrap();
    let b = store
        .save_dataset(&two, &meta("Inventory", "bo@example.com", &["Sales-Ops"]))
        .unwrap();
    store
        .save_dataset(&three, &meta("Weather", "ana@example.com", &[]))
        .unwrap();

    let ids = |q: &str, owner: &str| -> Vec<i64> {
        store
            .search_datasets(q, owner)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect()
    };

    assert_eq!(ids("sales", ""), vec![b, a]);
    assert_eq!(ids("sales", "ana@example.com"), vec![a]);
    assert_eq!(ids("FINANCE", ""), vec![a]);
    assert!(ids("sales", "nobody@example.com").is_empty());
    assert_eq!(ids("", "ana@example.com").len(), 2);
}

#[test]
fn upload_clean_search_delete_scenario() {
    let temp = TempDir::new().unwrap();
    let csv = temp.path().join("staff.csv");
    fs::write(
        &csv,
        "dept,salary\nIT,100\nIT,100\nHR,\nOps,90\nOps,95\nIT,105\n",
    )
    .unwrap();

    let config = AppConfig {
        data_dir: temp.path().join("data"),
        ..Default::default()
    };
    let ws = Workspace::open(config, "ana@example.com").unwrap();

    let imported = ws
        .import_file(
            &csv,
            ImportRequest {
                description: "staff salaries".to_string(),
                tags: vec!["hr".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(imported.rows, 6);

    let cleaned = ws
        .clean_dataset(
            imported.id,
            &CleanOptions {
                remove_duplicates: true,
                handle_missing: true,
                missing_strategy: MissingStrategy::FillMean,
                ..Default::default()
            },
            Some("staff clean"),
        )
        .unwrap();
    assert_eq!(cleaned.rows, 5);
    assert_eq!(cleaned.processing_log.len(), 3);

    let found = ws.store().search_datasets("salaries", "").unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, cleaned.id);

    let stats = ws.store().statistics().unwrap();
    assert_eq!(stats.total_datasets, 2);
    assert_eq!(stats.datasets_by_type.get("csv"), Some(&2));

    assert!(ws.store().delete_dataset(imported.id).unwrap());
    let (record, table) = ws.dataset(cleaned.id).unwrap();
    assert_eq!(record.name, "staff clean");
    assert_eq!(table.n_rows(), 5);
    assert!(matches!(ws.dataset(imported.id), Err(Error::NotFound)));
}
