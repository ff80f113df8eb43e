use std::path::Path;
use std::sync::{Arc, RwLock};

use tempfile::TempDir;

use crate::cache::{Cache, CacheConfig};
use crate::catalog::{Catalog, ColumnType, IndexKind, TableMeta};
use crate::compaction::CompactionMode;
use crate::compression::CODEC_NONE;
use crate::document::{Document, Value};

use super::super::TableEngine;

/// Column and index ids for the fixture table opened by
/// [`open_tagged_table`].
pub struct TaggedColumns {
    pub id: u32,
    pub tag: u32,
    pub tag_index: u32,
}

/// A table with a `U64` primary `id` column and a `String` secondary `tag`
/// column, opened fresh under a fresh temp directory.
pub fn open_tagged_table(
    compaction_mode: CompactionMode,
    max_record_count: u64,
) -> (TempDir, Arc<Catalog>, TableEngine, TaggedColumns) {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::open(&dir.path().join("catalog")).unwrap());
    let cache: Arc<RwLock<Cache>> = Arc::new(RwLock::new(Cache::new(CacheConfig::default())));

    let database = catalog.create_or_open_database("test").unwrap();
    let meta = catalog
        .create_or_open_table(database.id, "items", max_record_count, 64 * 1024 * 1024, 4)
        .unwrap();
    let id_col = catalog.add_column(meta.id, "id", ColumnType::U64).unwrap().id;
    let tag_col = catalog.add_column(meta.id, "tag", ColumnType::String).unwrap().id;
    catalog.create_index(meta.id, id_col, IndexKind::Primary).unwrap();
    let tag_index = catalog.create_index(meta.id, tag_col, IndexKind::Secondary).unwrap().id;
    let meta = catalog.table(meta.id).unwrap();

    let engine = TableEngine::open(
        Arc::clone(&catalog),
        cache,
        &dir.path().join("tables"),
        meta,
        CODEC_NONE,
        compaction_mode,
    )
    .unwrap();
    (
        dir,
        catalog,
        engine,
        TaggedColumns {
            id: id_col,
            tag: tag_col,
            tag_index,
        },
    )
}

pub fn reopen(dir: &Path, catalog: Arc<Catalog>, meta: TableMeta, compaction_mode: CompactionMode) -> TableEngine {
    let cache: Arc<RwLock<Cache>> = Arc::new(RwLock::new(Cache::new(CacheConfig::default())));
    TableEngine::open(catalog, cache, &dir.join("tables"), meta, CODEC_NONE, compaction_mode).unwrap()
}

pub fn doc(columns: &TaggedColumns, id: u64, tag: &str) -> Document {
    let mut d = Document::new();
    d.set(columns.id, Value::U64(id));
    d.set(columns.tag, Value::String(tag.to_string()));
    d
}
