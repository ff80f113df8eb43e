//! Compaction: none / minor / major (§4.9).
//!
//! Minor and major share one merge primitive, [`merge`]: decode every
//! selected SSTable's indexes and value-log oldest-first, fold per-index
//! entries into deduped/tombstone-filtered output, and hand the result to
//! the same [`crate::sstable::write_sstable`] builder the flush path uses.
//! Bucketing for minor compaction generalizes the teacher's
//! `stcs::{bucket_sstables, select_compaction_bucket}` from flat
//! `Arc<SSTable>` sizing to the per-table [`SstableListItem`] shape (a
//! value-log size plus every index's on-disk size).


use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;

use crate::catalog::IndexKind;
use crate::memtable::{IndexEntry, MemtableSnapshot, OrderKey};
use crate::sstable::{self, SSTable, SSTableError, SstableListItem};

/// Errors from a compaction pass.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How aggressively a table compacts its flushed SSTables (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactionMode {
    /// No background work; `tosdb_compact` is a no-op for this table.
    #[default]
    None,
    /// Merge same-sized-tier SSTables within one level.
    Minor,
    /// Merge an entire level into the next.
    Major,
}

/// Size-tiered bucketing (teacher's `stcs::bucket_sstables`, generalized to
/// the multi-index [`SstableListItem`] shape): items within
/// `[bucket_low, bucket_high]` of the running average size land in the same
/// bucket; anything under `min_sstable_size` goes in one catch-all bucket.
pub fn bucket_by_size(
    items: &[SstableListItem],
    min_sstable_size: u64,
    bucket_low: f64,
    bucket_high: f64,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| item_size(&items[i]));

    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut small: Vec<usize> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut running_avg: f64 = 0.0;

    for idx in order {
        let size = item_size(&items[idx]) as f64;
        if (size as u64) < min_sstable_size {
            small.push(idx);
            continue;
        }
        if current.is_empty() {
            current.push(idx);
            running_avg = size;
            continue;
        }
        let ratio = size / running_avg;
        if ratio >= bucket_low && ratio <= bucket_high {
            current.push(idx);
            let n = current.len() as f64;
            running_avg += (size - running_avg) / n;
        } else {
            buckets.push(std::mem::take(&mut current));
            current.push(idx);
            running_avg = size;
        }
    }
    if !current.is_empty() {
        buckets.push(current);
    }
    if small.len() > 1 {
        buckets.push(small);
    }
    buckets
}

fn item_size(item: &SstableListItem) -> u64 {
    item.valuelog_size + item.indexes.iter().map(|(_, _, size)| size).sum::<u64>()
}

/// Pick the largest bucket meeting `min_threshold` SSTables, capped at
/// `max_threshold` (teacher's `stcs::select_compaction_bucket`).
pub fn select_bucket(buckets: &[Vec<usize>], min_threshold: usize, max_threshold: usize) -> Option<Vec<usize>> {
    buckets
        .iter()
        .filter(|b| b.len() >= min_threshold)
        .max_by_key(|b| b.len())
        .map(|b| {
            let mut b = b.clone();
            b.truncate(max_threshold);
            b
        })
}

/// Merge `items` into one new SSTable at `new_level`.
///
/// Sources are folded oldest-id-first, so for primary/unique indexes a
/// later source's entry for the same key overwrites an earlier one
/// (newest wins); for secondary indexes entries are concatenated as-is —
/// a stale duplicate left behind by an updated secondary value is filtered
/// out by the engine's validate-on-read check at search time, not here.
///
/// Tombstones (`deleted` or `is_primary_key_deleted`) are dropped only
/// when `drop_tombstones` is set — the caller's job to determine: safe
/// only when no deeper level could still hold a value the tombstone is
/// shadowing.
///
/// Returns `None` when the pass left nothing live to write.
pub fn merge(
    dir: &Path,
    new_id: u64,
    new_level: u32,
    items: &[SstableListItem],
    compression_id: u32,
    drop_tombstones: bool,
    index_kinds: &HashMap<u32, IndexKind>,
) -> Result<Option<SstableListItem>, CompactionError> {
    let mut ordered = items.to_vec();
    ordered.sort_by_key(|i| i.id);
    let opened: Vec<SSTable> = ordered.into_iter().map(SSTable::open).collect::<Result<_, _>>()?;

    let mut value_buffer: Vec<u8> = Vec::new();
    let mut per_index: BTreeMap<u32, (IndexKind, Vec<(OrderKey, IndexEntry)>)> = BTreeMap::new();
    let mut last_position: HashMap<u32, BTreeMap<OrderKey, usize>> = HashMap::new();

    for sst in &opened {
        let valuelog = sst.decompressed_valuelog()?;
        for index_id in sst.index_ids() {
            let kind = *index_kinds.get(&index_id).unwrap_or(&IndexKind::Secondary);
            let entry_slot = per_index.entry(index_id).or_insert_with(|| (kind, Vec::new()));
            for (key, old_entry) in sst.decoded_index(index_id)? {
                let length = old_entry.value_length;
                let new_offset = value_buffer.len() as u64;
                if length > 0 {
                    let start = old_entry.value_offset as usize;
                    let end = start + length as usize;
                    value_buffer.extend_from_slice(&valuelog[start..end]);
                }
                let relocated = IndexEntry {
                    record_id: old_entry.record_id,
                    deleted: old_entry.deleted,
                    value_offset: if length > 0 { new_offset } else { 0 },
                    value_length: length,
                    primary_key: old_entry.primary_key,
                    is_primary_key_deleted: old_entry.is_primary_key_deleted,
                };
                match kind {
                    IndexKind::Primary | IndexKind::Unique => {
                        let positions = last_position.entry(index_id).or_default();
                        if let Some(&pos) = positions.get(&key) {
                            entry_slot.1[pos] = (key, relocated);
                        } else {
                            positions.insert(key.clone(), entry_slot.1.len());
                            entry_slot.1.push((key, relocated));
                        }
                    }
                    IndexKind::Secondary => entry_slot.1.push((key, relocated)),
                }
            }
        }
    }

    let mut snapshot_indexes = Vec::with_capacity(per_index.len());
    for (index_id, (kind, mut entries)) in per_index {
        if drop_tombstones {
            entries.retain(|(_, e)| !e.deleted && !e.is_primary_key_deleted);
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        snapshot_indexes.push((index_id, kind, entries));
    }

    let any_live = snapshot_indexes.iter().any(|(_, _, entries)| !entries.is_empty());
    if !any_live {
        return Ok(None);
    }

    let record_count = snapshot_indexes
        .iter()
        .find(|(_, kind, _)| *kind == IndexKind::Primary)
        .map(|(_, _, entries)| entries.len() as u64)
        .unwrap_or_else(|| opened.iter().map(|s| s.list_item.record_count).sum());

    let snapshot = MemtableSnapshot {
        value_buffer,
        indexes: snapshot_indexes,
    };
    let list_item = sstable::write_sstable(dir, new_id, new_level, record_count, &snapshot, compression_id)?;
    Ok(Some(list_item))
}
