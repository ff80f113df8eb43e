//! Crate-wide error type.
//!
//! [`TosDbError`] is the error surfaced at every public API boundary. It
//! aggregates the sub-module error enums (block codec, catalog, memtable,
//! sstable, WAL, compaction, encoding) via `#[from]`, following the same
//! shape the storage engine uses internally for its own aggregation.

use thiserror::Error;

use crate::block::BlockError;
use crate::catalog::CatalogError;
use crate::compaction::CompactionError;
use crate::compression::CompressionError;
use crate::encoding::EncodingError;
use crate::engine::manifest::TableManifestError;
use crate::memtable::MemtableError;
use crate::sstable::SSTableError;
use crate::wal::WalError;

/// All errors the engine can report at its public boundary.
#[derive(Debug, Error)]
pub enum TosDbError {
    /// Any failure from the `Backend` trait.
    #[error("backend I/O error: {0}")]
    BackendIO(#[from] std::io::Error),

    /// Magic/version/size/checksum mismatch on a block read.
    #[error("corrupt block: {0}")]
    CorruptBlock(#[from] BlockError),

    /// A version major that no codec in this build handles.
    #[error("unsupported format version: major {0}")]
    UnsupportedVersion(u16),

    /// The superblock names a compression codec id the build lacks.
    #[error("unknown compression codec id: {0}")]
    UnknownCompression(u32),

    /// Duplicate names, duplicate primary index, or a missing referenced column.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// An operation needs exactly one indexed key and received zero or many.
    #[error("operation requires exactly one indexed key, got {0}")]
    RecordKeyRequired(usize),

    /// `set`/`get` was called against a column of the wrong type.
    #[error("column '{column}' has type {expected:?}, got {actual:?}")]
    RecordColumnMismatch {
        /// Column name.
        column: String,
        /// The column's declared type.
        expected: crate::catalog::ColumnType,
        /// The type actually supplied/requested.
        actual: crate::catalog::ColumnType,
    },

    /// No live record satisfies the query. Normal, non-exceptional control flow.
    #[error("not found")]
    NotFound,

    /// A record would exceed a single-SST cap that cannot be split.
    #[error("value of {0} bytes exceeds the single-record budget")]
    OutOfBudget(usize),

    /// Catalog-layer failure (database/table/column/index management).
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Memtable-layer failure.
    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),

    /// SSTable-layer failure.
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),

    /// Per-table SST-list chain failure.
    #[error("table manifest error: {0}")]
    TableManifest(#[from] TableManifestError),

    /// WAL-layer failure.
    #[error("wal error: {0}")]
    Wal(#[from] WalError),

    /// Compaction-layer failure.
    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    /// Encoding/decoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Compression codec failure.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// An invariant was violated in a way that should be impossible.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TosDbError>;
