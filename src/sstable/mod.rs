//! SSTable — an immutable, on-disk flush of one table's memtable (§4.6-4.8).
//!
//! Generalizes the teacher's `sstable::{SSTable, SstWriter, BlockIterator,
//! ScanIterator}` (one flat LSN/MVCC-versioned keyspace, range tombstones,
//! mmap-based reads, a metaindex block of named entries) to the per-table
//! index shape: one file holds a compressed value-log block plus, for each
//! table index, a `sstable-index` block (bounds + compressed bloom filter +
//! a pointer to its `sstable-index-data` block) and the `sstable-index-data`
//! block itself (the index's fully ordered item sequence, compressed as one
//! stream). There is no LSN, no MVCC versioning, and no range tombstones —
//! none of the three are named anywhere in §4.6-§4.9, and a memtable's
//! `(hash, bytes, length)`-ordered, at-most-one-live-entry-per-key shape
//! carries no need for them.
//!
//! Every block is framed with [`crate::block`]'s shared header/checksum
//! (the same framing the catalog's list blocks and the superblock use)
//! rather than the teacher's bespoke header/footer/CRC32 scheme, so the
//! whole store has one block format instead of two.

#[cfg(test)]
mod tests;

mod builder;
mod encoding_impls;
mod iterator;

pub use builder::write_sstable;
pub use iterator::IndexScan;

use std::fs::File;
use std::path::PathBuf;

use bloomfilter::Bloom;
use memmap2::{Mmap, MmapOptions};
use thiserror::Error;

use crate::block::{BlockError, BlockType, read_block};
use crate::catalog::IndexKind;
use crate::compression::{self, CompressionError};
use crate::encoding::{Decode, Encode, EncodingError};
use crate::hash::hash64;
use crate::memtable::{IndexEntry, OrderKey};

/// Errors from SSTable construction or lookup.
#[derive(Debug, Error)]
pub enum SSTableError {
    #[error("block error: {0}")]
    Block(#[from] BlockError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index {0} not present in this SSTable")]
    IndexNotFound(u32),
    #[error("unexpected block type at offset {offset}: wanted {wanted:?}")]
    WrongBlockType { offset: u64, wanted: BlockType },
}

/// One table index's persisted (location, size) pair within an SST file,
/// plus the bounds needed to decide whether a lookup key can possibly be
/// present (§4.6, §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct SstableIndexMeta {
    pub index_id: u32,
    pub kind: IndexKind,
    pub first: OrderKey,
    pub last: OrderKey,
    pub data_location: u64,
    pub data_size: u64,
    pub item_count: u32,
}

/// The metadata a table's manifest persists for one flushed or compacted
/// SSTable: id, level, record count, the value-log's location/size, and for
/// each index its (index-location, index-size) — the literal shape named
/// in §4.6.
#[derive(Debug, Clone, PartialEq)]
pub struct SstableListItem {
    pub id: u64,
    pub level: u32,
    pub record_count: u64,
    pub valuelog_location: u64,
    pub valuelog_size: u64,
    pub indexes: Vec<(u32, u64, u64)>,
    pub path: PathBuf,
}

/// An open, immutable SSTable: the value-log and every index's bounds +
/// bloom filter are parsed eagerly at open time; index items and the
/// value-log bytes themselves are decompressed lazily, on demand, so a
/// cache layer above can memoize the expensive part (§4.2 Cache).
pub struct SSTable {
    pub list_item: SstableListItem,
    mmap: Mmap,
    indexes: Vec<(SstableIndexMeta, Bloom<Vec<u8>>)>,
}

struct ValuelogHeader {
    original_size: u64,
    codec_id: u32,
    packed_size: u32,
}

impl Encode for ValuelogHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.original_size.encode_to(buf)?;
        self.codec_id.encode_to(buf)?;
        self.packed_size.encode_to(buf)
    }
}

impl Decode for ValuelogHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (original_size, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (codec_id, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (packed_size, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            ValuelogHeader {
                original_size,
                codec_id,
                packed_size,
            },
            offset,
        ))
    }
}

/// One item as persisted in a `sstable-index-data` block: the ordering key
/// plus the index entry it maps to (§4.5, §4.6).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PersistedIndexItem {
    pub hash: u64,
    pub bytes: Vec<u8>,
    pub record_id: u64,
    pub deleted: bool,
    pub value_offset: u64,
    pub value_length: u32,
    pub primary_key: Vec<u8>,
    pub is_primary_key_deleted: bool,
}

impl From<(&OrderKey, &IndexEntry)> for PersistedIndexItem {
    fn from((key, entry): (&OrderKey, &IndexEntry)) -> Self {
        PersistedIndexItem {
            hash: key.hash,
            bytes: key.bytes.clone(),
            record_id: entry.record_id,
            deleted: entry.deleted,
            value_offset: entry.value_offset,
            value_length: entry.value_length,
            primary_key: entry.primary_key.clone(),
            is_primary_key_deleted: entry.is_primary_key_deleted,
        }
    }
}

impl PersistedIndexItem {
    fn order_key(&self) -> OrderKey {
        OrderKey {
            hash: self.hash,
            bytes: self.bytes.clone(),
        }
    }

    fn into_entry(self) -> (OrderKey, IndexEntry) {
        let order_key = self.order_key();
        (
            order_key,
            IndexEntry {
                record_id: self.record_id,
                deleted: self.deleted,
                value_offset: self.value_offset,
                value_length: self.value_length,
                primary_key: self.primary_key,
                is_primary_key_deleted: self.is_primary_key_deleted,
            },
        )
    }
}

impl SSTable {
    /// Open an already-written SST file, parsing every index's bounds and
    /// bloom filter eagerly. The value-log and index item lists are left
    /// compressed on disk until a read path actually needs them.
    pub fn open(list_item: SstableListItem) -> Result<Self, SSTableError> {
        let file = File::open(&list_item.path)?;
        // SAFETY: the file is only ever mutated by `write_sstable`, which
        // writes a temp file and renames it into place; no writer holds a
        // handle into an already-published path while a reader maps it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let mut indexes = Vec::with_capacity(list_item.indexes.len());
        for &(index_id, location, size) in &list_item.indexes {
            let region = mmap
                .get(location as usize..(location + size) as usize)
                .ok_or(SSTableError::WrongBlockType {
                    offset: location,
                    wanted: BlockType::SstableIndex,
                })?;
            let (_header, payload, block_type) = read_block(region)?;
            if block_type != BlockType::SstableIndex {
                return Err(SSTableError::WrongBlockType {
                    offset: location,
                    wanted: BlockType::SstableIndex,
                });
            }
            let (index_payload, _) = encoding_impls::IndexPayload::decode_from(&payload)?;
            if index_payload.index_id != index_id {
                return Err(SSTableError::IndexNotFound(index_id));
            }
            let codec = compression::resolve(index_payload.bloom_codec_id)?;
            let bloom_bytes = codec.unpack(&index_payload.bloom_packed)?;
            let bloom = Bloom::from_slice(&bloom_bytes)
                .map_err(|e| SSTableError::Compression(CompressionError::CodecFailure(e.to_string())))?;
            let meta = SstableIndexMeta {
                index_id: index_payload.index_id,
                kind: index_payload.kind,
                first: OrderKey {
                    hash: index_payload.first_hash,
                    bytes: index_payload.first_bytes,
                },
                last: OrderKey {
                    hash: index_payload.last_hash,
                    bytes: index_payload.last_bytes,
                },
                data_location: index_payload.data_location,
                data_size: index_payload.data_size,
                item_count: index_payload.item_count,
            };
            indexes.push((meta, bloom));
        }

        Ok(SSTable {
            list_item,
            mmap,
            indexes,
        })
    }

    fn index_meta(&self, index_id: u32) -> Option<&SstableIndexMeta> {
        self.indexes.iter().find(|(m, _)| m.index_id == index_id).map(|(m, _)| m)
    }

    /// `false` only when the key is provably absent from `index_id`: either
    /// out of this index's `(hash, bytes, length)` bounds, or rejected by
    /// its bloom filter (§4.7, §4.8).
    pub fn may_contain(&self, index_id: u32, key_bytes: &[u8]) -> bool {
        let Some((meta, bloom)) = self.indexes.iter().find(|(m, _)| m.index_id == index_id) else {
            return false;
        };
        let key_order = OrderKey {
            hash: hash64(key_bytes),
            bytes: key_bytes.to_vec(),
        };
        if key_order < meta.first || key_order > meta.last {
            return false;
        }
        bloom.check(&key_bytes.to_vec())
    }

    /// Decompress and decode one index's full ordered item list. Expensive;
    /// callers (the engine's primary-lookup/secondary-search paths) are
    /// expected to memoize this via the decoded-index caches in §4.2.
    pub fn decoded_index(&self, index_id: u32) -> Result<Vec<(OrderKey, IndexEntry)>, SSTableError> {
        let meta = self.index_meta(index_id).ok_or(SSTableError::IndexNotFound(index_id))?;
        let region = self
            .mmap
            .get(meta.data_location as usize..(meta.data_location + meta.data_size) as usize)
            .ok_or(SSTableError::IndexNotFound(index_id))?;
        let (_header, payload, block_type) = read_block(region)?;
        if block_type != BlockType::SstableIndexData {
            return Err(SSTableError::WrongBlockType {
                offset: meta.data_location,
                wanted: BlockType::SstableIndexData,
            });
        }
        let (data_header, consumed) = encoding_impls::IndexDataHeader::decode_from(&payload)?;
        let packed = &payload[consumed..consumed + data_header.packed_size as usize];
        let codec = compression::resolve(data_header.codec_id)?;
        let unpacked = codec.unpack(packed)?;
        let (items, _) = crate::encoding::decode_vec::<PersistedIndexItem>(&unpacked)?;
        Ok(items.into_iter().map(PersistedIndexItem::into_entry).collect())
    }

    /// Exact-match lookup in `index_id`, honoring bloom + bounds before
    /// paying for a full index decode (§4.7).
    pub fn get(&self, index_id: u32, key_bytes: &[u8]) -> Result<Option<IndexEntry>, SSTableError> {
        if !self.may_contain(index_id, key_bytes) {
            return Ok(None);
        }
        let order_key = OrderKey {
            hash: hash64(key_bytes),
            bytes: key_bytes.to_vec(),
        };
        let items = self.decoded_index(index_id)?;
        let found = items
            .binary_search_by(|(k, _)| k.cmp(&order_key))
            .ok()
            .map(|pos| items[pos].1.clone());
        Ok(found)
    }

    /// All entries at `key_bytes` in a secondary index (§4.8).
    pub fn search(&self, index_id: u32, key_bytes: &[u8]) -> Result<Vec<IndexEntry>, SSTableError> {
        if !self.may_contain(index_id, key_bytes) {
            return Ok(Vec::new());
        }
        let order_key = OrderKey {
            hash: hash64(key_bytes),
            bytes: key_bytes.to_vec(),
        };
        let items = self.decoded_index(index_id)?;
        let start = items.partition_point(|(k, _)| k < &order_key);
        let mut out = Vec::new();
        for (k, entry) in &items[start..] {
            if k != &order_key {
                break;
            }
            out.push(entry.clone());
        }
        Ok(out)
    }

    /// Decompress the full value-log. Callers slice `[offset, offset+length)`
    /// out of the result; memoize via the value-log cache in §4.2 to avoid
    /// repeated decompression.
    pub fn decompressed_valuelog(&self) -> Result<Vec<u8>, SSTableError> {
        let region = self
            .mmap
            .get(self.list_item.valuelog_location as usize
                ..(self.list_item.valuelog_location + self.list_item.valuelog_size) as usize)
            .ok_or(SSTableError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "valuelog region out of bounds",
            )))?;
        let (_header, payload, block_type) = read_block(region)?;
        if block_type != BlockType::Valuelog {
            return Err(SSTableError::WrongBlockType {
                offset: self.list_item.valuelog_location,
                wanted: BlockType::Valuelog,
            });
        }
        let (header, consumed) = ValuelogHeader::decode_from(&payload)?;
        let packed = &payload[consumed..consumed + header.packed_size as usize];
        let codec = compression::resolve(header.codec_id)?;
        let unpacked = codec.unpack(packed)?;
        debug_assert_eq!(unpacked.len() as u64, header.original_size);
        Ok(unpacked)
    }

    /// Every index id this SSTable carries.
    pub fn index_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.indexes.iter().map(|(m, _)| m.index_id)
    }

    /// `(first, last)` ordering bounds for `index_id`, if present.
    pub fn bounds(&self, index_id: u32) -> Option<(&OrderKey, &OrderKey)> {
        self.index_meta(index_id).map(|m| (&m.first, &m.last))
    }
}
