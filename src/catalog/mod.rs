//! The catalog: database → table → column/index hierarchy (§3, §4.4).
//!
//! Persistence is a direct generalization of the teacher's
//! `manifest::Manifest`: a WAL of catalog-mutation events plus a periodic
//! checksummed snapshot, replayed on open. Where the teacher's manifest
//! tracks one flat list of SSTable entries, this catalog tracks four nested
//! entity kinds (database, table, column, index); `Manifest`'s "append a new
//! list block that shadows the previous one" framing (§4.2, §4.4) is what
//! the WAL-of-events-plus-snapshot shape already gives, generalized to a
//! reverse-chain-per-level mental model rather than re-implemented as
//! literal per-level block chains.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::encoding::{Decode, Encode, EncodingError};
use crate::wal::{Wal, WalError};

/// Errors from catalog mutation or lookup.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database '{0}' already exists")]
    DatabaseExists(String),
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),
    #[error("table '{0}' already exists in this database")]
    TableExists(String),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("column '{0}' already exists on this table")]
    ColumnExists(String),
    #[error("column '{0}' not found on this table")]
    ColumnNotFound(String),
    #[error("table already has a primary index")]
    DuplicatePrimaryIndex,
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scalar/nested column types (§3 Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Document,
}

impl ColumnType {
    fn tag(self) -> u8 {
        match self {
            ColumnType::Bool => 0,
            ColumnType::I8 => 1,
            ColumnType::I16 => 2,
            ColumnType::I32 => 3,
            ColumnType::I64 => 4,
            ColumnType::U8 => 5,
            ColumnType::U16 => 6,
            ColumnType::U32 => 7,
            ColumnType::U64 => 8,
            ColumnType::F32 => 9,
            ColumnType::F64 => 10,
            ColumnType::String => 11,
            ColumnType::Bytes => 12,
            ColumnType::Document => 13,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, EncodingError> {
        Ok(match tag {
            0 => ColumnType::Bool,
            1 => ColumnType::I8,
            2 => ColumnType::I16,
            3 => ColumnType::I32,
            4 => ColumnType::I64,
            5 => ColumnType::U8,
            6 => ColumnType::U16,
            7 => ColumnType::U32,
            8 => ColumnType::U64,
            9 => ColumnType::F32,
            10 => ColumnType::F64,
            11 => ColumnType::String,
            12 => ColumnType::Bytes,
            13 => ColumnType::Document,
            other => {
                return Err(EncodingError::InvalidTag {
                    tag: other as u32,
                    type_name: "ColumnType",
                });
            }
        })
    }
}

impl Encode for ColumnType {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.tag().encode_to(buf)
    }
}

impl Decode for ColumnType {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tag, n) = u8::decode_from(buf)?;
        Ok((ColumnType::from_tag(tag)?, n))
    }
}

/// What role an index plays (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Secondary,
}

impl IndexKind {
    fn tag(self) -> u8 {
        match self {
            IndexKind::Primary => 0,
            IndexKind::Unique => 1,
            IndexKind::Secondary => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, EncodingError> {
        Ok(match tag {
            0 => IndexKind::Primary,
            1 => IndexKind::Unique,
            2 => IndexKind::Secondary,
            other => {
                return Err(EncodingError::InvalidTag {
                    tag: other as u32,
                    type_name: "IndexKind",
                });
            }
        })
    }
}

impl Encode for IndexKind {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.tag().encode_to(buf)
    }
}

impl Decode for IndexKind {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tag, n) = u8::decode_from(buf)?;
        Ok((IndexKind::from_tag(tag)?, n))
    }
}

/// A table column (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: u32,
    pub name: String,
    pub col_type: ColumnType,
}

/// A table index (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub id: u32,
    pub column_id: u32,
    pub kind: IndexKind,
}

/// A table's full metadata, lazily loaded per §4.4.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub id: u64,
    pub db_id: u64,
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexDef>,
    pub max_record_count: u64,
    pub max_valuelog_size: u64,
    pub max_memtable_count: u32,
    pub deleted: bool,
    next_column_id: u32,
    next_index_id: u32,
}

impl TableMeta {
    /// The table's one required primary index, if already created.
    pub fn primary_index(&self) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Look up a column by name.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by id.
    pub fn column_by_id(&self, id: u32) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// All indexes over `column_id`.
    pub fn indexes_for_column(&self, column_id: u32) -> impl Iterator<Item = &IndexDef> {
        self.indexes.iter().filter(move |i| i.column_id == column_id)
    }
}

/// A database's catalog entry (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseMeta {
    pub id: u64,
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default)]
struct CatalogData {
    databases: Vec<DatabaseMeta>,
    tables: Vec<TableMeta>,
    next_db_id: u64,
    next_table_id: u64,
}

// --------------------------------------------------------------------------
// Wire events
// --------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CatalogEvent {
    CreateDatabase { id: u64, name: String },
    DeleteDatabase { id: u64 },
    CreateTable {
        db_id: u64,
        id: u64,
        name: String,
        max_record_count: u64,
        max_valuelog_size: u64,
        max_memtable_count: u32,
    },
    DeleteTable { id: u64 },
    AddColumn { table_id: u64, id: u32, name: String, col_type: ColumnType },
    CreateIndex { table_id: u64, id: u32, column_id: u32, kind: IndexKind },
}

impl Encode for CatalogEvent {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            CatalogEvent::CreateDatabase { id, name } => {
                0u32.encode_to(buf)?;
                id.encode_to(buf)?;
                name.encode_to(buf)
            }
            CatalogEvent::DeleteDatabase { id } => {
                1u32.encode_to(buf)?;
                id.encode_to(buf)
            }
            CatalogEvent::CreateTable {
                db_id,
                id,
                name,
                max_record_count,
                max_valuelog_size,
                max_memtable_count,
            } => {
                2u32.encode_to(buf)?;
                db_id.encode_to(buf)?;
                id.encode_to(buf)?;
                name.encode_to(buf)?;
                max_record_count.encode_to(buf)?;
                max_valuelog_size.encode_to(buf)?;
                max_memtable_count.encode_to(buf)
            }
            CatalogEvent::DeleteTable { id } => {
                3u32.encode_to(buf)?;
                id.encode_to(buf)
            }
            CatalogEvent::AddColumn {
                table_id,
                id,
                name,
                col_type,
            } => {
                4u32.encode_to(buf)?;
                table_id.encode_to(buf)?;
                id.encode_to(buf)?;
                name.encode_to(buf)?;
                col_type.encode_to(buf)
            }
            CatalogEvent::CreateIndex {
                table_id,
                id,
                column_id,
                kind,
            } => {
                5u32.encode_to(buf)?;
                table_id.encode_to(buf)?;
                id.encode_to(buf)?;
                column_id.encode_to(buf)?;
                kind.encode_to(buf)
            }
        }
    }
}

impl Decode for CatalogEvent {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tag, mut offset) = u32::decode_from(buf)?;
        let event = match tag {
            0 => {
                let (id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (name, n) = String::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::CreateDatabase { id, name }
            }
            1 => {
                let (id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::DeleteDatabase { id }
            }
            2 => {
                let (db_id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (name, n) = String::decode_from(&buf[offset..])?;
                offset += n;
                let (max_record_count, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (max_valuelog_size, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (max_memtable_count, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::CreateTable {
                    db_id,
                    id,
                    name,
                    max_record_count,
                    max_valuelog_size,
                    max_memtable_count,
                }
            }
            3 => {
                let (id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::DeleteTable { id }
            }
            4 => {
                let (table_id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (id, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                let (name, n) = String::decode_from(&buf[offset..])?;
                offset += n;
                let (col_type, n) = ColumnType::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::AddColumn {
                    table_id,
                    id,
                    name,
                    col_type,
                }
            }
            5 => {
                let (table_id, n) = u64::decode_from(&buf[offset..])?;
                offset += n;
                let (id, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                let (column_id, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                let (kind, n) = IndexKind::decode_from(&buf[offset..])?;
                offset += n;
                CatalogEvent::CreateIndex {
                    table_id,
                    id,
                    column_id,
                    kind,
                }
            }
            other => {
                return Err(EncodingError::InvalidTag {
                    tag: other,
                    type_name: "CatalogEvent",
                });
            }
        };
        Ok((event, offset))
    }
}

// `Wal::open` requires a `wal-<seq>.log` filename (its `parse_seq_from_path`
// has no fallback for other names); the catalog always uses sequence 0,
// since it is never rotated.
const CATALOG_WAL_FILENAME: &str = "wal-0.log";

/// The database → table → column/index hierarchy for one store.
///
/// Mutation methods take `&self`: durability and in-memory state are both
/// behind a `Mutex`, the same interior-mutability shape the teacher's
/// `Manifest` uses so a single `Table`/`TosDb` handle can be shared across
/// threads without an outer lock for catalog reads.
pub struct Catalog {
    wal: Wal<CatalogEvent>,
    data: Mutex<CatalogData>,
}

impl Catalog {
    /// Open (or create) the catalog WAL rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, CatalogError> {
        std::fs::create_dir_all(dir)?;
        let wal_path: PathBuf = dir.join(CATALOG_WAL_FILENAME);
        let wal = Wal::<CatalogEvent>::open(&wal_path, None)?;
        let mut data = CatalogData::default();
        for record in wal.replay_iter()? {
            let event = record?;
            apply(&mut data, event);
        }
        tracing::debug!(databases = data.databases.len(), tables = data.tables.len(), "catalog replayed");
        Ok(Catalog {
            wal,
            data: Mutex::new(data),
        })
    }

    /// Create a database named `name`, or return its existing entry.
    pub fn create_or_open_database(&self, name: &str) -> Result<DatabaseMeta, CatalogError> {
        let mut data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = data.databases.iter().find(|d| d.name == name && !d.deleted) {
            return Ok(existing.clone());
        }
        let id = data.next_db_id;
        let event = CatalogEvent::CreateDatabase {
            id,
            name: name.to_string(),
        };
        self.wal.append(&event)?;
        data.next_db_id += 1;
        apply(&mut data, event);
        tracing::info!(db_id = id, name, "database created");
        Ok(data.databases.last().cloned().expect("just inserted"))
    }

    /// Create a table named `name` under `db_id`, or return its existing
    /// metadata (loaded eagerly here — this catalog keeps all table
    /// metadata resident once read, which is the "lazy on first access"
    /// contract of §4.4 applied at the `Catalog` handle's granularity).
    #[allow(clippy::too_many_arguments)]
    pub fn create_or_open_table(
        &self,
        db_id: u64,
        name: &str,
        max_record_count: u64,
        max_valuelog_size: u64,
        max_memtable_count: u32,
    ) -> Result<TableMeta, CatalogError> {
        let mut data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = data
            .tables
            .iter()
            .find(|t| t.db_id == db_id && t.name == name && !t.deleted)
        {
            return Ok(existing.clone());
        }
        let id = data.next_table_id;
        let event = CatalogEvent::CreateTable {
            db_id,
            id,
            name: name.to_string(),
            max_record_count,
            max_valuelog_size,
            max_memtable_count,
        };
        self.wal.append(&event)?;
        data.next_table_id += 1;
        apply(&mut data, event);
        tracing::info!(table_id = id, name, "table created");
        Ok(data.tables.last().cloned().expect("just inserted"))
    }

    /// Add a column to `table_id`.
    pub fn add_column(
        &self,
        table_id: u64,
        name: &str,
        col_type: ColumnType,
    ) -> Result<Column, CatalogError> {
        let mut data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let table = data
            .tables
            .iter()
            .find(|t| t.id == table_id)
            .ok_or_else(|| CatalogError::TableNotFound(table_id.to_string()))?;
        if table.column_by_name(name).is_some() {
            return Err(CatalogError::ColumnExists(name.to_string()));
        }
        let id = table.next_column_id;
        let event = CatalogEvent::AddColumn {
            table_id,
            id,
            name: name.to_string(),
            col_type,
        };
        self.wal.append(&event)?;
        apply(&mut data, event);
        let table = data.tables.iter().find(|t| t.id == table_id).expect("exists");
        Ok(table.column_by_id(id).cloned().expect("just inserted"))
    }

    /// Create an index over `column_id` of kind `kind`.
    pub fn create_index(
        &self,
        table_id: u64,
        column_id: u32,
        kind: IndexKind,
    ) -> Result<IndexDef, CatalogError> {
        let mut data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let table = data
            .tables
            .iter()
            .find(|t| t.id == table_id)
            .ok_or_else(|| CatalogError::TableNotFound(table_id.to_string()))?;
        if kind == IndexKind::Primary && table.primary_index().is_some() {
            return Err(CatalogError::DuplicatePrimaryIndex);
        }
        let id = table.next_index_id;
        let event = CatalogEvent::CreateIndex {
            table_id,
            id,
            column_id,
            kind,
        };
        self.wal.append(&event)?;
        apply(&mut data, event);
        let table = data.tables.iter().find(|t| t.id == table_id).expect("exists");
        Ok(table
            .indexes
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .expect("just inserted"))
    }

    /// Look up a table's current metadata snapshot.
    pub fn table(&self, table_id: u64) -> Option<TableMeta> {
        let data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        data.tables.iter().find(|t| t.id == table_id).cloned()
    }

    /// Look up a table by (db, name).
    pub fn table_by_name(&self, db_id: u64, name: &str) -> Option<TableMeta> {
        let data = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        data.tables
            .iter()
            .find(|t| t.db_id == db_id && t.name == name && !t.deleted)
            .cloned()
    }
}

fn apply(data: &mut CatalogData, event: CatalogEvent) {
    match event {
        CatalogEvent::CreateDatabase { id, name } => {
            if !data.databases.iter().any(|d| d.id == id) {
                data.databases.push(DatabaseMeta {
                    id,
                    name,
                    deleted: false,
                });
            }
            if data.next_db_id <= id {
                data.next_db_id = id + 1;
            }
        }
        CatalogEvent::DeleteDatabase { id } => {
            if let Some(db) = data.databases.iter_mut().find(|d| d.id == id) {
                db.deleted = true;
            }
        }
        CatalogEvent::CreateTable {
            db_id,
            id,
            name,
            max_record_count,
            max_valuelog_size,
            max_memtable_count,
        } => {
            if !data.tables.iter().any(|t| t.id == id) {
                data.tables.push(TableMeta {
                    id,
                    db_id,
                    name,
                    columns: Vec::new(),
                    indexes: Vec::new(),
                    max_record_count,
                    max_valuelog_size,
                    max_memtable_count,
                    deleted: false,
                    next_column_id: 0,
                    next_index_id: 0,
                });
            }
            if data.next_table_id <= id {
                data.next_table_id = id + 1;
            }
        }
        CatalogEvent::DeleteTable { id } => {
            if let Some(table) = data.tables.iter_mut().find(|t| t.id == id) {
                table.deleted = true;
            }
        }
        CatalogEvent::AddColumn {
            table_id,
            id,
            name,
            col_type,
        } => {
            if let Some(table) = data.tables.iter_mut().find(|t| t.id == table_id) {
                if !table.columns.iter().any(|c| c.id == id) {
                    table.columns.push(Column { id, name, col_type });
                }
                if table.next_column_id <= id {
                    table.next_column_id = id + 1;
                }
            }
        }
        CatalogEvent::CreateIndex {
            table_id,
            id,
            column_id,
            kind,
        } => {
            if let Some(table) = data.tables.iter_mut().find(|t| t.id == table_id) {
                if !table.indexes.iter().any(|i| i.id == id) {
                    table.indexes.push(IndexDef { id, column_id, kind });
                }
                if table.next_index_id <= id {
                    table.next_index_id = id + 1;
                }
            }
        }
    }
}
