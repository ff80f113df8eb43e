use tempfile::tempdir;

use crate::catalog::IndexKind;
use crate::compression::CODEC_NONE;
use crate::memtable::{IndexKeySpec, Memtable};
use crate::sstable::{SSTable, write_sstable};

fn keys(primary: &[u8], secondary_index: u32, secondary: &[u8]) -> Vec<IndexKeySpec> {
    vec![
        IndexKeySpec {
            index_id: 0,
            kind: IndexKind::Primary,
            key_bytes: primary.to_vec(),
            primary_key: Vec::new(),
        },
        IndexKeySpec {
            index_id: secondary_index,
            kind: IndexKind::Secondary,
            key_bytes: secondary.to_vec(),
            primary_key: primary.to_vec(),
        },
    ]
}

#[test]
fn secondary_search_returns_all_matching_records_after_flush() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let mt = Memtable::open(wal_dir.path(), 0, 1000, 1 << 20).expect("open memtable");

    let id1 = mt.next_record_id();
    mt.upsert(id1, b"alice-doc", keys(b"alice", 1, b"engineering")).expect("upsert 1");
    let id2 = mt.next_record_id();
    mt.upsert(id2, b"bob-doc", keys(b"bob", 1, b"engineering")).expect("upsert 2");
    let id3 = mt.next_record_id();
    mt.upsert(id3, b"carol-doc", keys(b"carol", 1, b"sales")).expect("upsert 3");

    let snapshot = mt.snapshot_for_flush();
    let list_item =
        write_sstable(sst_dir.path(), 1, 0, mt.record_count(), &snapshot, CODEC_NONE).expect("write sstable");
    let sst = SSTable::open(list_item).expect("open sstable");

    let matches = sst.search(1, b"engineering").expect("search ok");
    let mut primary_keys: Vec<Vec<u8>> = matches.iter().map(|e| e.primary_key.clone()).collect();
    primary_keys.sort();
    assert_eq!(primary_keys, vec![b"alice".to_vec(), b"bob".to_vec()]);

    let sales = sst.search(1, b"sales").expect("search ok");
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].primary_key, b"carol");
}

#[test]
fn secondary_search_on_missing_key_is_empty() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let mt = Memtable::open(wal_dir.path(), 0, 1000, 1 << 20).expect("open memtable");
    let id = mt.next_record_id();
    mt.upsert(id, b"doc", keys(b"alice", 1, b"engineering")).expect("upsert");
    let snapshot = mt.snapshot_for_flush();
    let list_item =
        write_sstable(sst_dir.path(), 1, 0, mt.record_count(), &snapshot, CODEC_NONE).expect("write sstable");
    let sst = SSTable::open(list_item).expect("open sstable");

    assert!(sst.search(1, b"marketing").expect("search ok").is_empty());
}

#[test]
fn primary_and_secondary_indexes_coexist_in_one_sstable() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let mt = Memtable::open(wal_dir.path(), 0, 1000, 1 << 20).expect("open memtable");
    let id = mt.next_record_id();
    mt.upsert(id, b"alice-doc", keys(b"alice", 1, b"engineering")).expect("upsert");
    let snapshot = mt.snapshot_for_flush();
    let list_item =
        write_sstable(sst_dir.path(), 1, 0, mt.record_count(), &snapshot, CODEC_NONE).expect("write sstable");
    let sst = SSTable::open(list_item).expect("open sstable");

    let mut ids: Vec<u32> = sst.index_ids().collect();
    ids.sort();
    assert_eq!(ids, vec![0, 1]);
    assert!(sst.get(0, b"alice").expect("lookup ok").is_some());
    assert_eq!(sst.search(1, b"engineering").expect("search ok").len(), 1);
}
