//! Micro-benchmarks for TOSDB core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- upsert    # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use std::path::Path;

use tempfile::TempDir;
use tosdb::catalog::{ColumnType, IndexKind};
use tosdb::compaction::CompactionMode;
use tosdb::db::{Table, TableConfig, TosDb, TosDbConfig};
use tosdb::document::Value;

/// Larger payload (1 KiB) for the value-size comparison benchmark.
const PAYLOAD_1K: &[u8; 1024] = &[0xCD; 1024];

fn small_table_config(max_record_count: u64) -> TableConfig {
    TableConfig {
        max_record_count,
        max_valuelog_size: 64 * 1024 * 1024,
        max_memtable_count: 4,
        compaction_mode: CompactionMode::Minor,
    }
}

/// Open a fresh instance and its one `items` table, with a primary index on
/// `id` and a secondary index on `tag`.
fn open_items_db(dir: &Path, max_record_count: u64) -> TosDb {
    let db = TosDb::open(dir, TosDbConfig::default()).expect("open");
    let database = db.database_create_or_open("bench").expect("database");
    let table = database
        .table_create_or_open("items", small_table_config(max_record_count))
        .expect("table");
    table.column_add("id", ColumnType::U64).unwrap();
    table.column_add("tag", ColumnType::String).unwrap();
    table.column_add("payload", ColumnType::Bytes).unwrap();
    table.index_create("id", IndexKind::Primary).unwrap();
    table.index_create("tag", IndexKind::Secondary).unwrap();
    db
}

fn items_table(db: &TosDb) -> Table<'_> {
    db.database_create_or_open("bench")
        .unwrap()
        .table_create_or_open("items", small_table_config(u64::MAX))
        .unwrap()
}

fn upsert_one(table: &Table<'_>, id: u64, payload: &[u8]) {
    let mut record = table.create_record();
    record.set("id", Value::U64(id)).unwrap();
    record.set("tag", Value::String(format!("tag-{}", id % 100))).unwrap();
    record.set("payload", Value::Bytes(payload.to_vec())).unwrap();
    record.upsert().unwrap();
}

/// Pre-populate `count` sequential records and close the instance, so
/// SSTables exist on disk for the on-disk read benchmarks.
fn prepopulate(dir: &Path, count: u64) {
    let db = open_items_db(dir, 256);
    let table = items_table(&db);
    for i in 0..count {
        upsert_one(&table, i, PAYLOAD_1K.as_slice());
    }
    db.close().unwrap();
}

/// `upsert`: memtable-only (huge record budget, no flush) vs. a tiny budget
/// that forces a flush roughly every 64 writes.
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    group.bench_function("memtable_only", |b| {
        let dir = TempDir::new().unwrap();
        let db = open_items_db(dir.path(), 1_000_000);
        let table = items_table(&db);
        let mut seq = 0u64;
        b.iter(|| {
            upsert_one(&table, black_box(seq), PAYLOAD_1K.as_slice());
            seq += 1;
        });
        db.close().unwrap();
    });

    group.bench_function("with_flush", |b| {
        let dir = TempDir::new().unwrap();
        let db = open_items_db(dir.path(), 64);
        let table = items_table(&db);
        let mut seq = 0u64;
        b.iter(|| {
            upsert_one(&table, black_box(seq), PAYLOAD_1K.as_slice());
            seq += 1;
        });
        db.close().unwrap();
    });

    group.finish();
}

/// `get` by primary key: memtable-resident vs. flushed-to-SSTable, each
/// with a hit and a miss variant (miss exercises the bloom-filter path).
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let n = 5_000u64;

    {
        let dir = TempDir::new().unwrap();
        let db = open_items_db(dir.path(), 1_000_000);
        let table = items_table(&db);
        for i in 0..n {
            upsert_one(&table, i, PAYLOAD_1K.as_slice());
        }

        group.bench_function("memtable_hit", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let _ = black_box(table.get(Value::U64(black_box(i % n))).unwrap());
                i += 1;
            });
        });

        group.bench_function("memtable_miss", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let _ = black_box(table.get(Value::U64(black_box(n + i))).unwrap());
                i += 1;
            });
        });

        db.close().unwrap();
    }

    {
        let dir = TempDir::new().unwrap();
        prepopulate(dir.path(), n);
        let db = TosDb::open(dir.path(), TosDbConfig::default()).unwrap();
        let table = items_table(&db);

        group.bench_function("sstable_hit", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let _ = black_box(table.get(Value::U64(black_box(i % n))).unwrap());
                i += 1;
            });
        });

        group.bench_function("sstable_miss", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let _ = black_box(table.get(Value::U64(black_box(n + i))).unwrap());
                i += 1;
            });
        });

        db.close().unwrap();
    }

    group.finish();
}

/// `search` by the secondary `tag` index, each tag shared by ~1% of records.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let dir = TempDir::new().unwrap();
    let db = open_items_db(dir.path(), 1_000_000);
    let table = items_table(&db);
    let n = 10_000u64;
    for i in 0..n {
        upsert_one(&table, i, PAYLOAD_1K.as_slice());
    }

    group.bench_function("secondary_index", |b| {
        let mut tag = 0u64;
        b.iter(|| {
            let mut probe = table.create_record();
            probe.set("tag", Value::String(format!("tag-{}", black_box(tag) % 100))).unwrap();
            let _ = black_box(probe.search("tag").unwrap());
            tag += 1;
        });
    });

    group.finish();
    db.close().unwrap();
}

/// `delete` by primary key, memtable-resident.
fn bench_delete(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_items_db(dir.path(), 1_000_000);
    let table = items_table(&db);
    let n = 50_000u64;
    for i in 0..n {
        upsert_one(&table, i, PAYLOAD_1K.as_slice());
    }

    c.bench_function("delete", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let record = table.get(Value::U64(black_box(i % n))).unwrap();
            if let Some(record) = record {
                record.delete().unwrap();
            }
            i += 1;
        });
    });

    db.close().unwrap();
}

/// Minor and major compaction over a table with several flushed SSTables.
fn bench_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("compaction");
    group.sample_size(10);

    for mode in [CompactionMode::Minor, CompactionMode::Major] {
        let label = match mode {
            CompactionMode::Minor => "minor",
            CompactionMode::Major => "major",
            CompactionMode::None => unreachable!(),
        };
        group.bench_function(BenchmarkId::new("mode", label), |b| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let db = TosDb::open(dir.path(), TosDbConfig::default()).unwrap();
                    let database = db.database_create_or_open("bench").unwrap();
                    let table = database
                        .table_create_or_open(
                            "items",
                            TableConfig {
                                max_record_count: 64,
                                max_valuelog_size: 64 * 1024 * 1024,
                                max_memtable_count: 4,
                                compaction_mode: mode,
                            },
                        )
                        .unwrap();
                    table.column_add("id", ColumnType::U64).unwrap();
                    table.index_create("id", IndexKind::Primary).unwrap();
                    for i in 0..2_000u64 {
                        let mut record = table.create_record();
                        record.set("id", Value::U64(i)).unwrap();
                        record.upsert().unwrap();
                    }
                    (dir, db)
                },
                |(_dir, db)| {
                    db.compact().unwrap();
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Reopen latency as a function of how much data the catalog + per-table
/// manifests need to replay.
fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery");
    group.sample_size(10);

    for &n in &[1_000u64, 10_000] {
        group.bench_function(BenchmarkId::new("reopen", n), |b| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    prepopulate(dir.path(), n);
                    dir
                },
                |dir| {
                    let db = TosDb::open(dir.path(), TosDbConfig::default()).unwrap();
                    black_box(&db);
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_upsert,
    bench_get,
    bench_search,
    bench_delete,
    bench_compaction,
    bench_recovery,
);

criterion_main!(benches);
