//! Public API (§6): [`TosDb`] owns the catalog and the shared cache; every
//! open table's [`engine::TableEngine`] is created lazily on first
//! `table_create_or_open` and kept resident for the life of the handle.
//! [`Database`], [`Table`], and [`Record`] are thin borrowing wrappers that
//! resolve column/index names against the catalog and delegate the actual
//! work to the engine — they carry no state of their own beyond the ids
//! needed to find their way back to it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::cache::{Cache, CacheConfig};
use crate::catalog::{Catalog, ColumnType, IndexKind, TableMeta};
use crate::compaction::CompactionMode;
use crate::compression::CODEC_NONE;
use crate::document::{Document, Value};
use crate::engine::TableEngine;
use crate::error::{Result, TosDbError};

const CATALOG_DIR: &str = "catalog";
const TABLES_DIR: &str = "tables";

/// Top-level, database-independent settings for a [`TosDb`] instance.
#[derive(Debug, Clone)]
pub struct TosDbConfig {
    /// Compression codec id used for newly written SSTables.
    pub default_compression: u32,
    /// Initial shared cache budgets; can be changed later via
    /// [`TosDb::cache_config_set`].
    pub cache: CacheConfig,
}

impl Default for TosDbConfig {
    fn default() -> Self {
        TosDbConfig {
            default_compression: CODEC_NONE,
            cache: CacheConfig::default(),
        }
    }
}

/// Per-table tuning, supplied at `table_create_or_open` time. Ignored on
/// subsequent opens of an already-existing table — the catalog is the
/// source of truth for the durable limits, which are fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    /// Memtable record-count budget before a flush is forced (§4.5).
    pub max_record_count: u64,
    /// Memtable value-log byte budget before a flush is forced (§4.5).
    pub max_valuelog_size: u64,
    /// How many frozen memtables may accumulate before new writes block on
    /// a flush completing (§4.5). Currently advisory — flush is synchronous
    /// and inline, so this bound is never actually exceeded.
    pub max_memtable_count: u32,
    /// How `tosdb_compact` behaves for this table (§4.9).
    pub compaction_mode: CompactionMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            max_record_count: 65_536,
            max_valuelog_size: 64 * 1024 * 1024,
            max_memtable_count: 4,
            compaction_mode: CompactionMode::Minor,
        }
    }
}

/// An open TOSDB instance: one catalog, one shared cache, and a registry of
/// the table engines opened under it so far.
pub struct TosDb {
    dir: PathBuf,
    catalog: Arc<Catalog>,
    cache: Arc<RwLock<Cache>>,
    config: RwLock<TosDbConfig>,
    tables: RwLock<HashMap<u64, Arc<TableEngine>>>,
}

impl TosDb {
    /// Open (or create) a TOSDB instance rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P, config: TosDbConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "tosdb open");
        let catalog = Arc::new(Catalog::open(&dir.join(CATALOG_DIR))?);
        let cache = Arc::new(RwLock::new(Cache::new(config.cache)));
        std::fs::create_dir_all(dir.join(TABLES_DIR))?;
        tracing::info!(dir = %dir.display(), "tosdb opened");
        Ok(TosDb {
            dir,
            catalog,
            cache,
            config: RwLock::new(config),
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Create (or open) a database named `name`.
    pub fn database_create_or_open(&self, name: &str) -> Result<Database<'_>> {
        tracing::debug!(name, "database create_or_open");
        let meta = self.catalog.create_or_open_database(name)?;
        Ok(Database {
            db: self,
            id: meta.id,
            name: meta.name,
        })
    }

    /// Replace the shared cache's byte budgets.
    pub fn cache_config_set(&self, cache: CacheConfig) {
        tracing::debug!("tosdb cache_config_set");
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_config(cache);
        self.config.write().unwrap_or_else(PoisonError::into_inner).cache = cache;
    }

    /// Run compaction (per each open table's configured mode) across every
    /// table opened so far in this session.
    pub fn compact(&self) -> Result<()> {
        tracing::debug!("tosdb compact");
        let engines: Vec<Arc<TableEngine>> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for engine in engines {
            engine.compact()?;
        }
        tracing::info!("tosdb compact complete");
        Ok(())
    }

    /// Close this instance. Every mutation is already fsync'd to its WAL
    /// before the call that made it returns, so there is no buffered state
    /// to flush here — this exists for API symmetry with `tosdb_new`.
    pub fn close(&self) -> Result<()> {
        tracing::debug!(dir = %self.dir.display(), "tosdb close");
        Ok(())
    }

    fn engine_for(&self, table_id: u64) -> Result<Arc<TableEngine>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table_id)
            .cloned()
            .ok_or_else(|| TosDbError::Internal(format!("table {table_id} is not open")))
    }

    fn table_engine(&self, meta: TableMeta, compaction_mode: CompactionMode) -> Result<Arc<TableEngine>> {
        let table_id = meta.id;
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(engine) = tables.get(&table_id) {
                return Ok(engine.clone());
            }
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = tables.get(&table_id) {
            return Ok(engine.clone());
        }
        let compression_id = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .default_compression;
        let engine = Arc::new(TableEngine::open(
            self.catalog.clone(),
            self.cache.clone(),
            &self.dir.join(TABLES_DIR),
            meta,
            compression_id,
            compaction_mode,
        )?);
        tables.insert(table_id, engine.clone());
        Ok(engine)
    }
}

/// A handle to one database within a [`TosDb`] instance.
pub struct Database<'a> {
    db: &'a TosDb,
    id: u64,
    name: String,
}

impl<'a> Database<'a> {
    /// This database's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create (or open) a table named `name` under this database.
    pub fn table_create_or_open(&self, name: &str, config: TableConfig) -> Result<Table<'a>> {
        tracing::debug!(db_id = self.id, name, "table create_or_open");
        let meta = self.db.catalog.create_or_open_table(
            self.id,
            name,
            config.max_record_count,
            config.max_valuelog_size,
            config.max_memtable_count,
        )?;
        let table_id = meta.id;
        self.db.table_engine(meta, config.compaction_mode)?;
        tracing::info!(table_id, name, "table ready");
        Ok(Table {
            db: self.db,
            table_id,
        })
    }
}

/// A handle to one table. Column and index names are resolved against the
/// catalog's current metadata on every call, so schema changes made through
/// other handles (or other processes sharing nothing but the catalog file)
/// are visible immediately.
pub struct Table<'a> {
    db: &'a TosDb,
    table_id: u64,
}

impl<'a> Table<'a> {
    fn meta(&self) -> Result<TableMeta> {
        self.db
            .catalog
            .table(self.table_id)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("table {} no longer exists", self.table_id)))
    }

    fn engine(&self) -> Result<Arc<TableEngine>> {
        self.db.engine_for(self.table_id)
    }

    /// Add a column of type `col_type`.
    pub fn column_add(&self, name: &str, col_type: ColumnType) -> Result<()> {
        tracing::debug!(table_id = self.table_id, name, ?col_type, "table column_add");
        self.db.catalog.add_column(self.table_id, name, col_type)?;
        self.engine()?.refresh_meta()?;
        tracing::info!(table_id = self.table_id, name, "column added");
        Ok(())
    }

    /// Create an index of kind `kind` over `column_name`.
    pub fn index_create(&self, column_name: &str, kind: IndexKind) -> Result<()> {
        tracing::debug!(table_id = self.table_id, column_name, ?kind, "table index_create");
        let meta = self.meta()?;
        let column = meta
            .column_by_name(column_name)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("column '{column_name}' does not exist")))?;
        self.db.catalog.create_index(self.table_id, column.id, kind)?;
        self.engine()?.refresh_meta()?;
        tracing::info!(table_id = self.table_id, column_name, "index created");
        Ok(())
    }

    /// Start a new, empty record bound to this table.
    pub fn create_record(&self) -> Record<'a> {
        Record {
            db: self.db,
            table_id: self.table_id,
            document: Document::new(),
        }
    }

    /// Fetch the record whose primary index value is `primary_key` (§4.7).
    pub fn get(&self, primary_key: Value) -> Result<Option<Record<'a>>> {
        tracing::debug!(table_id = self.table_id, "table get");
        let key_bytes = primary_key.key_bytes();
        let document = self.engine()?.get(&key_bytes)?;
        Ok(document.map(|document| Record {
            db: self.db,
            table_id: self.table_id,
            document,
        }))
    }

    /// Every record currently live under this table's primary index (§4.7).
    pub fn get_primary_keys(&self) -> Result<Vec<Record<'a>>> {
        tracing::debug!(table_id = self.table_id, "table get_primary_keys");
        let engine = self.engine()?;
        let keys = engine.primary_keys()?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(document) = engine.get(&key)? {
                out.push(Record {
                    db: self.db,
                    table_id: self.table_id,
                    document,
                });
            }
        }
        Ok(out)
    }
}

/// A document in flight against one table: either freshly created via
/// `create_record` and awaiting `set`/`upsert`, or returned from `get`/
/// `search`/`get_primary_keys` and already populated from storage.
pub struct Record<'a> {
    db: &'a TosDb,
    table_id: u64,
    document: Document,
}

impl<'a> Record<'a> {
    fn meta(&self) -> Result<TableMeta> {
        self.db
            .catalog
            .table(self.table_id)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("table {} no longer exists", self.table_id)))
    }

    fn engine(&self) -> Result<Arc<TableEngine>> {
        self.db.engine_for(self.table_id)
    }

    /// Set `column_name`'s value. Errors if the column doesn't exist or
    /// `value`'s type doesn't match the column's declared type.
    pub fn set(&mut self, column_name: &str, value: Value) -> Result<()> {
        let meta = self.meta()?;
        let column = meta
            .column_by_name(column_name)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("column '{column_name}' does not exist")))?;
        if value.column_type() != column.col_type {
            return Err(TosDbError::RecordColumnMismatch {
                column: column.name.clone(),
                expected: column.col_type,
                actual: value.column_type(),
            });
        }
        self.document.set(column.id, value);
        Ok(())
    }

    /// Read `column_name`'s current value, if set on this record.
    pub fn get(&self, column_name: &str) -> Result<Option<&Value>> {
        let meta = self.meta()?;
        let column = meta
            .column_by_name(column_name)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("column '{column_name}' does not exist")))?;
        Ok(self.document.get(column.id))
    }

    /// Write this record's current fields, inserting or overwriting by
    /// primary key. Returns the memtable-local record id assigned to the
    /// write (not stable across flushes — not a public identity, just a
    /// debugging aid).
    pub fn upsert(&self) -> Result<u64> {
        tracing::debug!(table_id = self.table_id, "record upsert");
        let id = self.engine()?.upsert(self.document.clone())?;
        tracing::info!(table_id = self.table_id, record_id = id, "record upserted");
        Ok(id)
    }

    /// Delete the record whose primary key equals this record's current
    /// primary-index field. Returns whether a live record was found.
    pub fn delete(&self) -> Result<bool> {
        tracing::debug!(table_id = self.table_id, "record delete");
        let meta = self.meta()?;
        let primary = meta
            .primary_index()
            .ok_or_else(|| TosDbError::SchemaConflict(format!("table '{}' has no primary index", meta.name)))?;
        let column = meta
            .column_by_id(primary.column_id)
            .ok_or_else(|| TosDbError::Internal("primary index references unknown column".into()))?;
        let value = self
            .document
            .get(column.id)
            .ok_or(TosDbError::RecordKeyRequired(0))?;
        let removed = self.engine()?.delete(&value.key_bytes())?;
        tracing::info!(table_id = self.table_id, removed, "record delete requested");
        Ok(removed)
    }

    /// Find every live record whose `column_name` currently equals this
    /// record's value for that column, via `column_name`'s declared index
    /// (§4.8). Errors if the column has no index.
    pub fn search(&self, column_name: &str) -> Result<Vec<Record<'a>>> {
        tracing::debug!(table_id = self.table_id, column_name, "record search");
        let meta = self.meta()?;
        let column = meta
            .column_by_name(column_name)
            .ok_or_else(|| TosDbError::SchemaConflict(format!("column '{column_name}' does not exist")))?;
        let index = meta
            .indexes_for_column(column.id)
            .next()
            .ok_or_else(|| TosDbError::SchemaConflict(format!("column '{column_name}' has no index")))?;
        let value = self
            .document
            .get(column.id)
            .ok_or(TosDbError::RecordKeyRequired(0))?;
        let key_bytes = value.key_bytes();
        let documents = self.engine()?.search(index.id, &key_bytes)?;
        Ok(documents
            .into_iter()
            .map(|document| Record {
                db: self.db,
                table_id: self.table_id,
                document,
            })
            .collect())
    }

    /// Drop this handle without writing it. Equivalent to letting it go out
    /// of scope; named for symmetry with the rest of the record lifecycle.
    pub fn destroy(self) {
        tracing::debug!(table_id = self.table_id, "record destroy");
    }
}
