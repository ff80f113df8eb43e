//! SSTable writer — flushes one memtable snapshot to a complete SST file.
//!
//! Generalizes the teacher's `SstWriter` (point entries + range tombstones,
//! written block-by-block with a running `BufWriter`, atomic `.tmp` →
//! rename) to the per-index shape: a value-log block, then one
//! `sstable-index-data` block followed by its `sstable-index` block per
//! table index, each block chained to the previous via
//! [`crate::block::write_block`]'s `previous_block_location` pointer. The
//! whole file is built in memory and written out with one atomic
//! rename, matching the teacher's crash-safety discipline.

use std::path::Path;

use bloomfilter::Bloom;

use crate::block::{BlockType, write_block};
use crate::compression;
use crate::encoding::Encode;
use crate::memtable::MemtableSnapshot;

use super::encoding_impls::{IndexDataHeader, IndexPayload};
use super::{PersistedIndexItem, SSTableError, SstableListItem, ValuelogHeader};

/// False-positive rate for persisted per-index bloom filters — the same
/// rate the memtable's own bloom filters use (§9 Open Question b).
const SST_INDEX_BLOOM_FALSE_POSITIVE_RATE: f64 = 0.008;

/// Write `snapshot` to a new SST file under `dir`, returning the
/// [`SstableListItem`] the caller's manifest should persist.
pub fn write_sstable(
    dir: &Path,
    id: u64,
    level: u32,
    record_count: u64,
    snapshot: &MemtableSnapshot,
    compression_id: u32,
) -> Result<SstableListItem, SSTableError> {
    std::fs::create_dir_all(dir)?;
    let codec = compression::resolve(compression_id)?;

    let mut out = Vec::new();
    let mut cursor: u64 = 0;
    let mut previous = (0u64, 0u64, true);

    let packed = codec.pack(&snapshot.value_buffer)?;
    let mut valuelog_payload = Vec::new();
    ValuelogHeader {
        original_size: snapshot.value_buffer.len() as u64,
        codec_id: compression_id,
        packed_size: packed.len() as u32,
    }
    .encode_to(&mut valuelog_payload)?;
    valuelog_payload.extend_from_slice(&packed);
    let valuelog_block = write_block(BlockType::Valuelog, previous, &valuelog_payload);
    let valuelog_location = cursor;
    let valuelog_size = valuelog_block.len() as u64;
    cursor += valuelog_block.len() as u64;
    previous = (valuelog_location, valuelog_size, false);
    out.extend_from_slice(&valuelog_block);

    let mut indexes = Vec::with_capacity(snapshot.indexes.len());
    for (index_id, kind, items) in &snapshot.indexes {
        let persisted: Vec<PersistedIndexItem> =
            items.iter().map(|(k, e)| PersistedIndexItem::from((k, e))).collect();
        let mut raw = Vec::new();
        crate::encoding::encode_vec(&persisted, &mut raw)?;
        let packed_items = codec.pack(&raw)?;
        let mut data_payload = Vec::new();
        IndexDataHeader {
            record_count: persisted.len() as u32,
            codec_id: compression_id,
            packed_size: packed_items.len() as u32,
        }
        .encode_to(&mut data_payload)?;
        data_payload.extend_from_slice(&packed_items);
        let data_block = write_block(BlockType::SstableIndexData, previous, &data_payload);
        let data_location = cursor;
        let data_size = data_block.len() as u64;
        cursor += data_block.len() as u64;
        previous = (data_location, data_size, false);
        out.extend_from_slice(&data_block);

        let mut bloom = Bloom::new_for_fp_rate(items.len().max(1), SST_INDEX_BLOOM_FALSE_POSITIVE_RATE)
            .unwrap_or_else(|_| {
                Bloom::new_for_fp_rate(1, SST_INDEX_BLOOM_FALSE_POSITIVE_RATE).expect("fallback bloom")
            });
        for (key, _) in items {
            bloom.set(&key.bytes);
        }
        let bloom_packed = codec.pack(&bloom.as_slice().to_vec())?;

        let (first, last) = match (items.first(), items.last()) {
            (Some((f, _)), Some((l, _))) => (f.clone(), l.clone()),
            _ => (
                crate::memtable::OrderKey { hash: 0, bytes: Vec::new() },
                crate::memtable::OrderKey { hash: 0, bytes: Vec::new() },
            ),
        };

        let index_payload = IndexPayload {
            index_id: *index_id,
            kind: *kind,
            first_hash: first.hash,
            first_bytes: first.bytes,
            last_hash: last.hash,
            last_bytes: last.bytes,
            bloom_codec_id: compression_id,
            bloom_packed,
            data_location,
            data_size,
            item_count: items.len() as u32,
        };
        let mut index_buf = Vec::new();
        index_payload.encode_to(&mut index_buf)?;
        let index_block = write_block(BlockType::SstableIndex, previous, &index_buf);
        let index_location = cursor;
        let index_size = index_block.len() as u64;
        cursor += index_block.len() as u64;
        previous = (index_location, index_size, false);
        out.extend_from_slice(&index_block);

        indexes.push((*index_id, index_location, index_size));
    }

    let final_path = dir.join(format!("sst-{id}.dat"));
    let tmp_path = dir.join(format!("sst-{id}.dat.tmp"));
    std::fs::write(&tmp_path, &out)?;
    std::fs::rename(&tmp_path, &final_path)?;

    Ok(SstableListItem {
        id,
        level,
        record_count,
        valuelog_location,
        valuelog_size,
        indexes,
        path: final_path,
    })
}
