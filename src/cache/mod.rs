//! The cache layer — four bounded, typed caches keyed by a composite
//! `(kind, db_id, table_id, index_id, level, sst_id)` address (§4.3).
//!
//! The teacher relies on `memmap2` + the OS page cache instead of an
//! explicit cache, so this layer has no direct teacher precedent; it is
//! built in the teacher's idiom regardless — a small `Mutex`-guarded
//! structure, the way `memtable::MemtableInner` wraps its `BTreeMap`s, with
//! a hand-rolled intrusive LRU list rather than an LRU crate (the teacher
//! reaches for `BTreeMap` by hand in `memtable` rather than importing a
//! map/cache crate, so this follows suit).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Mutex;

/// Which of the four cache kinds an entry belongs to (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Bloom filter + first/last key bounds for an (table, index, level, sst).
    BloomAndBounds,
    /// Decoded primary index array + record count + value-log pointer.
    PrimaryIndex,
    /// Decoded secondary index array.
    SecondaryIndex,
    /// Decompressed value-log bytes.
    ValueLog,
}

/// The composite cache key named in §4.3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub db_id: u64,
    pub table_id: u64,
    pub index_id: u64,
    pub level: u32,
    pub sst_id: u64,
}

/// Per-kind byte budgets, set via `tosdb_cache_config_set` (§6).
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub bloomfilter_size: u64,
    pub index_data_size: u64,
    pub secondary_index_data_size: u64,
    pub valuelog_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        // A cache-off configuration: every cap is zero, so every put is
        // immediately evicted and every get misses. Property 8 (cache-off /
        // cache-on equivalence) requires this to behave identically to not
        // having a cache at all.
        CacheConfig {
            bloomfilter_size: 0,
            index_data_size: 0,
            secondary_index_data_size: 0,
            valuelog_size: 0,
        }
    }
}

impl CacheConfig {
    fn cap_for(&self, kind: CacheKind) -> u64 {
        match kind {
            CacheKind::BloomAndBounds => self.bloomfilter_size,
            CacheKind::PrimaryIndex => self.index_data_size,
            CacheKind::SecondaryIndex => self.secondary_index_data_size,
            CacheKind::ValueLog => self.valuelog_size,
        }
    }
}

struct Entry {
    bytes: std::sync::Arc<Vec<u8>>,
    size: u64,
    /// Monotonic tick at last access, used for LRU eviction.
    last_used: u64,
}

struct PerKind {
    entries: HashMap<CacheKey, Entry>,
    total_bytes: u64,
    hits: u64,
    misses: u64,
}

impl PerKind {
    fn new() -> Self {
        PerKind {
            entries: HashMap::new(),
            total_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }
}

/// Observability snapshot for one cache kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// The four-kind bounded cache. Thread-safe: all mutation goes through a
/// single `Mutex` per kind, matching §5's requirement that the cache be the
/// one shared-mutable structure in the engine.
pub struct Cache {
    config: CacheConfig,
    bloom: Mutex<PerKind>,
    primary: Mutex<PerKind>,
    secondary: Mutex<PerKind>,
    valuelog: Mutex<PerKind>,
    clock: std::sync::atomic::AtomicU64,
}

impl Cache {
    /// Build a cache with the given per-kind byte budgets.
    pub fn new(config: CacheConfig) -> Self {
        Cache {
            config,
            bloom: Mutex::new(PerKind::new()),
            primary: Mutex::new(PerKind::new()),
            secondary: Mutex::new(PerKind::new()),
            valuelog: Mutex::new(PerKind::new()),
            clock: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Replace this cache's byte budgets. Does not evict existing entries
    /// proactively; the next `put` that would exceed the new cap will evict
    /// down to it.
    pub fn set_config(&mut self, config: CacheConfig) {
        self.config = config;
    }

    fn tick(&self) -> u64 {
        self.clock
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    fn lock_for(&self, kind: CacheKind) -> &Mutex<PerKind> {
        match kind {
            CacheKind::BloomAndBounds => &self.bloom,
            CacheKind::PrimaryIndex => &self.primary,
            CacheKind::SecondaryIndex => &self.secondary,
            CacheKind::ValueLog => &self.valuelog,
        }
    }

    /// Look up `key`. Returns `None` on a miss (including when the kind's
    /// cap is zero, i.e. cache disabled).
    pub fn get(&self, key: &CacheKey) -> Option<std::sync::Arc<Vec<u8>>> {
        let tick = self.tick();
        let lock = self.lock_for(key.kind);
        let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entry) = guard.entries.get_mut(key) {
            entry.last_used = tick;
            guard.hits += 1;
            let bytes = entry.bytes.clone();
            tracing::trace!(?key.kind, "cache hit");
            Some(bytes)
        } else {
            guard.misses += 1;
            None
        }
    }

    /// Insert `bytes` for `key`, evicting least-recently-used entries of the
    /// same kind until the kind's total is within budget.
    pub fn put(&self, key: CacheKey, bytes: Vec<u8>) {
        let cap = self.config.cap_for(key.kind);
        let size = bytes.len() as u64;
        if cap == 0 || size > cap {
            // Cache disabled for this kind, or a single entry that can never
            // fit — no-op rather than thrash.
            return;
        }
        let tick = self.tick();
        let lock = self.lock_for(key.kind);
        let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(old) = guard.entries.remove(&key) {
            guard.total_bytes -= old.size;
        }

        while guard.total_bytes + size > cap {
            let evict_key = guard
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match evict_key {
                Some(k) => {
                    if let Some(removed) = guard.entries.remove(&k) {
                        guard.total_bytes -= removed.size;
                    }
                }
                None => break,
            }
        }

        guard.entries.insert(
            key,
            Entry {
                bytes: std::sync::Arc::new(bytes),
                size,
                last_used: tick,
            },
        );
        guard.total_bytes += size;
    }

    /// Drop every entry for `(db_id, table_id)` — used when a table is
    /// dropped or its SST chain is invalidated by compaction.
    pub fn invalidate_table(&self, db_id: u64, table_id: u64) {
        for lock in [&self.bloom, &self.primary, &self.secondary, &self.valuelog] {
            let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let to_remove: Vec<CacheKey> = guard
                .entries
                .keys()
                .filter(|k| k.db_id == db_id && k.table_id == table_id)
                .cloned()
                .collect();
            for k in to_remove {
                if let Some(e) = guard.entries.remove(&k) {
                    guard.total_bytes -= e.size;
                }
            }
        }
    }

    /// Per-kind observability snapshot.
    pub fn stats(&self, kind: CacheKind) -> CacheStats {
        let guard = self
            .lock_for(kind)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        CacheStats {
            entries: guard.entries.len(),
            bytes: guard.total_bytes,
            hits: guard.hits,
            misses: guard.misses,
        }
    }
}
