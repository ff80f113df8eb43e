//! # TOSDB
//!
//! An embeddable, log-structured, multi-table document store with secondary
//! indexes. Built on a **Log-Structured Merge Tree (LSM-tree)** architecture:
//! writes land in a per-table memtable and its WAL first, memtables freeze
//! and flush to immutable SSTables, and SSTables merge via background or
//! explicit compaction.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            TosDb                                │
//! │  ┌────────────┐                                                 │
//! │  │  Catalog   │  database → table → column/index hierarchy     │
//! │  └─────┬──────┘                                                 │
//! │        │                                                        │
//! │  ┌─────▼──────────────────── one per table ───────────────────┐ │
//! │  │  TableEngine                                                │ │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌─────────────┐         │ │
//! │  │  │  Active     │  │   Frozen     │  │  SSTables   │         │ │
//! │  │  │  Memtable   │  │  Memtables   │  │  (leveled)  │         │ │
//! │  │  │  + WAL      │  │  + WALs      │  │             │         │ │
//! │  │  └─────┬───────┘  └──────┬───────┘  └──────┬──────┘         │ │
//! │  │        │   freeze        │   flush         │                │ │
//! │  │        └─────────►       └────────►        │                │ │
//! │  │                                            ▼                │ │
//! │  │                   Compaction (none / minor / major)         │ │
//! │  └───────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Cache (bloom+bounds, primary index,     │ │
//! │  │                    secondary index, value-log)             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`db`] | Public API — `TosDb`, `Database`, `Table`, `Record` |
//! | [`catalog`] | Database → table → column/index hierarchy |
//! | [`document`] | The tagged `Document`/`Value` record model |
//! | [`engine`] | Per-table storage engine — memtable stack, SST levels, lookup, search |
//! | [`memtable`] | Per-table in-memory write buffer, one ordered index per table index |
//! | [`sstable`] | Immutable, on-disk flushes of a memtable, one file per table index group |
//! | [`wal`] | Generic, CRC-protected write-ahead log for crash recovery |
//! | [`compaction`] | None / minor / major compaction strategies |
//! | [`cache`] | Bounded, typed caches over decoded index/value-log bytes |
//! | [`block`] | Shared on-disk block framing + the root superblock |
//! | [`backend`] | Byte-addressable storage backends (file, in-memory) |
//! | [`compression`] | Pluggable block compression codecs |
//! | [`hash`] | The seeded hash used for key ordering and bloom salting |
//! | [`error`] | The crate-wide `TosDbError` |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is persisted to a WAL before
//!   being acknowledged, guaranteeing durability and crash recovery.
//! - **Per-table secondary indexes** — a table can declare any number of
//!   unique/secondary indexes over its columns in addition to its one
//!   required primary index.
//! - **Bloom filter lookups** — every persisted index carries a bloom filter
//!   for fast negative point-lookup responses.
//! - **Block-level integrity** — every on-disk block is checksummed with a
//!   shared header format.
//! - **Pluggable compaction** — none, minor (size-tiered, within a level),
//!   and major (full level merge) strategies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tosdb::cache::CacheConfig;
//! use tosdb::catalog::{ColumnType, IndexKind};
//! use tosdb::db::{TosDb, TosDbConfig};
//! use tosdb::document::Value;
//!
//! let db = TosDb::open("/tmp/my_db", TosDbConfig::default()).unwrap();
//! let database = db.database_create_or_open("shop").unwrap();
//! let table = database.table_create_or_open("orders", Default::default()).unwrap();
//!
//! table.column_add("order_id", ColumnType::U64).unwrap();
//! table.column_add("customer", ColumnType::String).unwrap();
//! table.index_create("order_id", IndexKind::Primary).unwrap();
//! table.index_create("customer", IndexKind::Secondary).unwrap();
//!
//! let mut record = table.create_record();
//! record.set("order_id", Value::U64(1)).unwrap();
//! record.set("customer", Value::String("alice".into())).unwrap();
//! record.upsert().unwrap();
//!
//! let fetched = table.get(Value::U64(1)).unwrap().unwrap();
//! assert_eq!(fetched.get("customer").unwrap(), Some(&Value::String("alice".into())));
//!
//! let by_customer = record.search("customer").unwrap();
//! assert_eq!(by_customer.len(), 1);
//!
//! db.cache_config_set(CacheConfig::default());
//! db.compact().unwrap();
//! db.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod backend;
pub mod block;
pub mod cache;
pub mod catalog;
pub mod compaction;
pub mod compression;
pub mod db;
pub mod document;
pub mod engine;
pub mod error;
pub mod hash;
pub mod memtable;
pub mod sstable;
pub mod wal;
