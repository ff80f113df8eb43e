//! Integration tests targeting schema-management and error-path coverage
//! not exercised by `tests/integration.rs`: duplicate/invalid schema
//! mutations, type mismatches, and major compaction.

use tempfile::TempDir;
use tosdb::catalog::{ColumnType, IndexKind};
use tosdb::compaction::CompactionMode;
use tosdb::db::{TableConfig, TosDb, TosDbConfig};
use tosdb::document::Value;
use tosdb::error::TosDbError;

fn open(dir: &std::path::Path) -> TosDb {
    TosDb::open(dir, TosDbConfig::default()).expect("open")
}

#[test]
fn column_add_rejects_duplicate_name() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();

    let err = table.column_add("order_id", ColumnType::String).unwrap_err();
    assert!(matches!(err, TosDbError::Catalog(_)));
}

#[test]
fn index_create_rejects_second_primary_index() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();
    table.column_add("alt_id", ColumnType::U64).unwrap();
    table.index_create("order_id", IndexKind::Primary).unwrap();

    let err = table.index_create("alt_id", IndexKind::Primary).unwrap_err();
    assert!(matches!(err, TosDbError::Catalog(_)));
}

#[test]
fn index_create_rejects_unknown_column() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();

    let err = table.index_create("does_not_exist", IndexKind::Primary).unwrap_err();
    assert!(matches!(err, TosDbError::SchemaConflict(_)));
}

#[test]
fn record_set_rejects_unknown_column() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();

    let mut record = table.create_record();
    let err = record.set("missing", Value::U64(1)).unwrap_err();
    assert!(matches!(err, TosDbError::SchemaConflict(_)));
}

#[test]
fn record_set_rejects_type_mismatch() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();

    let mut record = table.create_record();
    let err = record.set("order_id", Value::String("nope".into())).unwrap_err();
    assert!(matches!(err, TosDbError::RecordColumnMismatch { .. }));
}

#[test]
fn upsert_without_primary_column_set_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();
    table.column_add("customer", ColumnType::String).unwrap();
    table.index_create("order_id", IndexKind::Primary).unwrap();

    let mut record = table.create_record();
    record.set("customer", Value::String("alice".into())).unwrap();
    let err = record.upsert().unwrap_err();
    assert!(matches!(err, TosDbError::RecordKeyRequired(_)));
}

#[test]
fn search_on_unindexed_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database.table_create_or_open("orders", TableConfig::default()).unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();
    table.column_add("notes", ColumnType::String).unwrap();
    table.index_create("order_id", IndexKind::Primary).unwrap();

    let mut record = table.create_record();
    record.set("order_id", Value::U64(1)).unwrap();
    record.set("notes", Value::String("hello".into())).unwrap();
    record.upsert().unwrap();

    let probe = table.create_record();
    let mut probe = probe;
    probe.set("notes", Value::String("hello".into())).unwrap();
    let err = probe.search("notes").unwrap_err();
    assert!(matches!(err, TosDbError::SchemaConflict(_)));
}

#[test]
fn value_exceeding_valuelog_budget_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database
        .table_create_or_open(
            "blobs",
            TableConfig {
                max_record_count: 64,
                max_valuelog_size: 32,
                max_memtable_count: 4,
                compaction_mode: CompactionMode::None,
            },
        )
        .unwrap();
    table.column_add("id", ColumnType::U64).unwrap();
    table.column_add("payload", ColumnType::Bytes).unwrap();
    table.index_create("id", IndexKind::Primary).unwrap();

    let mut record = table.create_record();
    record.set("id", Value::U64(1)).unwrap();
    record.set("payload", Value::Bytes(vec![0u8; 4096])).unwrap();
    let err = record.upsert().unwrap_err();
    assert!(matches!(err, TosDbError::OutOfBudget(_)));
}

#[test]
fn major_compaction_merges_levels_and_preserves_live_data() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    let database = db.database_create_or_open("shop").unwrap();
    let table = database
        .table_create_or_open(
            "orders",
            TableConfig {
                max_record_count: 4,
                max_valuelog_size: 4096,
                max_memtable_count: 4,
                compaction_mode: CompactionMode::Major,
            },
        )
        .unwrap();
    table.column_add("order_id", ColumnType::U64).unwrap();
    table.column_add("customer", ColumnType::String).unwrap();
    table.index_create("order_id", IndexKind::Primary).unwrap();

    for id in 0u64..20 {
        let mut record = table.create_record();
        record.set("order_id", Value::U64(id)).unwrap();
        record.set("customer", Value::String(format!("user-{id}"))).unwrap();
        record.upsert().unwrap();
    }
    table.get(Value::U64(5)).unwrap().unwrap().delete().unwrap();

    db.compact().unwrap();
    db.compact().unwrap();

    assert!(table.get(Value::U64(5)).unwrap().is_none());
    for id in (0u64..20).filter(|&id| id != 5) {
        assert!(table.get(Value::U64(id)).unwrap().is_some(), "record {id} missing");
    }
}
