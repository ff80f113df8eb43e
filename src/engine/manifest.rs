//! Per-table durable SST-list (§4.2, §4.9): which SSTables exist at which
//! level, replayed on open.
//!
//! The per-table analogue of the catalog's own WAL-of-events pattern,
//! generalized from the teacher's flat `manifest::Manifest` (one list of
//! `id`/`path` entries, periodically snapshotted) to the richer per-index
//! `SstableListItem` shape a table's SST files actually carry, and to a
//! per-level chain rather than one flat list. A compaction event always
//! removes the old entries before adding their replacement, so a reader
//! that replays only a prefix of the log never sees a level holding both
//! stale and merged entries for the same key range.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::encoding::{Decode, Encode, EncodingError};
use crate::sstable::SstableListItem;
use crate::wal::{Wal, WalError};

const MANIFEST_WAL_FILENAME: &str = "wal-0.log";

#[derive(Debug, Error)]
pub enum TableManifestError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
enum ManifestEvent {
    AddSstable { level: u32, item: SstableListItem },
    RemoveSstables { removed: Vec<(u32, u64)> },
}

impl Encode for SstableListItem {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.id.encode_to(buf)?;
        self.level.encode_to(buf)?;
        self.record_count.encode_to(buf)?;
        self.valuelog_location.encode_to(buf)?;
        self.valuelog_size.encode_to(buf)?;
        (self.indexes.len() as u32).encode_to(buf)?;
        for (index_id, location, size) in &self.indexes {
            index_id.encode_to(buf)?;
            location.encode_to(buf)?;
            size.encode_to(buf)?;
        }
        self.path.encode_to(buf)
    }
}

impl Decode for SstableListItem {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (id, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (level, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (record_count, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (valuelog_location, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (valuelog_size, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (index_count, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let index_count = index_count.min(crate::encoding::MAX_VEC_ELEMENTS) as usize;
        let mut indexes = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            let (index_id, n) = u32::decode_from(&buf[offset..])?;
            offset += n;
            let (location, n) = u64::decode_from(&buf[offset..])?;
            offset += n;
            let (size, n) = u64::decode_from(&buf[offset..])?;
            offset += n;
            indexes.push((index_id, location, size));
        }
        let (path, n) = PathBuf::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            SstableListItem {
                id,
                level,
                record_count,
                valuelog_location,
                valuelog_size,
                indexes,
                path,
            },
            offset,
        ))
    }
}

impl Encode for ManifestEvent {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            ManifestEvent::AddSstable { level, item } => {
                0u32.encode_to(buf)?;
                level.encode_to(buf)?;
                item.encode_to(buf)
            }
            ManifestEvent::RemoveSstables { removed } => {
                1u32.encode_to(buf)?;
                (removed.len() as u32).encode_to(buf)?;
                for (level, id) in removed {
                    level.encode_to(buf)?;
                    id.encode_to(buf)?;
                }
                Ok(())
            }
        }
    }
}

impl Decode for ManifestEvent {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (tag, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        match tag {
            0 => {
                let (level, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                let (item, n) = SstableListItem::decode_from(&buf[offset..])?;
                offset += n;
                Ok((ManifestEvent::AddSstable { level, item }, offset))
            }
            1 => {
                let (count, n) = u32::decode_from(&buf[offset..])?;
                offset += n;
                let count = count.min(crate::encoding::MAX_VEC_ELEMENTS) as usize;
                let mut removed = Vec::with_capacity(count);
                for _ in 0..count {
                    let (level, n) = u32::decode_from(&buf[offset..])?;
                    offset += n;
                    let (id, n) = u64::decode_from(&buf[offset..])?;
                    offset += n;
                    removed.push((level, id));
                }
                Ok((ManifestEvent::RemoveSstables { removed }, offset))
            }
            other => Err(EncodingError::InvalidTag {
                tag: other,
                type_name: "ManifestEvent",
            }),
        }
    }
}

fn apply(levels: &mut Vec<Vec<SstableListItem>>, event: ManifestEvent) {
    match event {
        ManifestEvent::AddSstable { level, item } => {
            let idx = level as usize;
            while levels.len() <= idx {
                levels.push(Vec::new());
            }
            if !levels[idx].iter().any(|i| i.id == item.id) {
                levels[idx].push(item);
            }
        }
        ManifestEvent::RemoveSstables { removed } => {
            for (level, id) in removed {
                if let Some(l) = levels.get_mut(level as usize) {
                    l.retain(|i| i.id != id);
                }
            }
        }
    }
}

/// The durable SST-list chain for one table, replayed on open.
pub struct TableManifest {
    wal: Wal<ManifestEvent>,
    levels: Mutex<Vec<Vec<SstableListItem>>>,
}

impl TableManifest {
    pub fn open(dir: &Path) -> Result<Self, TableManifestError> {
        std::fs::create_dir_all(dir)?;
        let wal_path: PathBuf = dir.join(MANIFEST_WAL_FILENAME);
        let wal = Wal::<ManifestEvent>::open(&wal_path, None)?;
        let mut levels = Vec::new();
        for record in wal.replay_iter()? {
            apply(&mut levels, record?);
        }
        Ok(TableManifest {
            wal,
            levels: Mutex::new(levels),
        })
    }

    /// A snapshot of every level's current SST-list entries, newest flush
    /// order within each `Vec` preserved as persisted.
    pub fn levels(&self) -> Vec<Vec<SstableListItem>> {
        self.levels.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Record a freshly flushed SSTable at `level`.
    pub fn add_sstable(&self, level: u32, item: SstableListItem) -> Result<(), TableManifestError> {
        let event = ManifestEvent::AddSstable { level, item };
        self.wal.append(&event)?;
        apply(&mut self.levels.lock().unwrap_or_else(std::sync::PoisonError::into_inner), event);
        Ok(())
    }

    /// Invalidate `removed` (possibly spanning more than one level, as a
    /// major compaction does) and, if the pass produced surviving data,
    /// add its replacement — in that order, so a reader never observes the
    /// replacement without its inputs also being gone.
    pub fn apply_compaction(
        &self,
        removed: &[(u32, u64)],
        added: Option<(u32, SstableListItem)>,
    ) -> Result<(), TableManifestError> {
        let remove_event = ManifestEvent::RemoveSstables {
            removed: removed.to_vec(),
        };
        self.wal.append(&remove_event)?;
        {
            let mut levels = self.levels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            apply(&mut levels, remove_event);
        }
        if let Some((level, item)) = added {
            let add_event = ManifestEvent::AddSstable { level, item };
            self.wal.append(&add_event)?;
            apply(&mut self.levels.lock().unwrap_or_else(std::sync::PoisonError::into_inner), add_event);
        }
        Ok(())
    }
}
