use super::*;

fn key(sst_id: u64) -> CacheKey {
    CacheKey {
        kind: CacheKind::ValueLog,
        db_id: 1,
        table_id: 1,
        index_id: 0,
        level: 1,
        sst_id,
    }
}

#[test]
fn disabled_cache_never_hits() {
    let cache = Cache::new(CacheConfig::default());
    cache.put(key(1), vec![1, 2, 3]);
    assert!(cache.get(&key(1)).is_none());
}

#[test]
fn hit_after_put_within_budget() {
    let cache = Cache::new(CacheConfig {
        valuelog_size: 1024,
        ..CacheConfig::default()
    });
    cache.put(key(1), vec![1, 2, 3]);
    assert_eq!(cache.get(&key(1)).unwrap().as_slice(), &[1, 2, 3]);
}

#[test]
fn evicts_lru_when_over_budget() {
    let cache = Cache::new(CacheConfig {
        valuelog_size: 10,
        ..CacheConfig::default()
    });
    cache.put(key(1), vec![0u8; 6]);
    cache.put(key(2), vec![0u8; 6]);
    // key(1) was inserted first and should be evicted to make room.
    assert!(cache.get(&key(1)).is_none());
    assert!(cache.get(&key(2)).is_some());
}

#[test]
fn invalidate_table_drops_matching_entries() {
    let cache = Cache::new(CacheConfig {
        valuelog_size: 1024,
        ..CacheConfig::default()
    });
    cache.put(key(1), vec![1]);
    cache.invalidate_table(1, 1);
    assert!(cache.get(&key(1)).is_none());
}

#[test]
fn stats_reflect_hits_and_misses() {
    let cache = Cache::new(CacheConfig {
        valuelog_size: 1024,
        ..CacheConfig::default()
    });
    cache.put(key(1), vec![1]);
    let _ = cache.get(&key(1));
    let _ = cache.get(&key(2));
    let stats = cache.stats(CacheKind::ValueLog);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}
