use crate::catalog::IndexKind;
use crate::memtable::{IndexKeySpec, Memtable};
use tempfile::tempdir;

fn primary_key(key: &[u8]) -> IndexKeySpec {
    IndexKeySpec {
        index_id: 0,
        kind: IndexKind::Primary,
        key_bytes: key.to_vec(),
        primary_key: Vec::new(),
    }
}

#[test]
fn frozen_memtable_stays_readable() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    let id = mt.next_record_id();
    mt.upsert(id, b"value", vec![primary_key(b"k1")]).expect("upsert");

    let frozen = mt.freeze();
    let entry = frozen.get(0, b"k1").expect("present");
    assert_eq!(frozen.read_value(entry.value_offset, entry.value_length), b"value");
}

#[test]
fn snapshot_for_flush_contains_all_indexes() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    let id1 = mt.next_record_id();
    mt.upsert(id1, b"a", vec![primary_key(b"k1")]).expect("upsert 1");
    let id2 = mt.next_record_id();
    mt.upsert(id2, b"bb", vec![primary_key(b"k2")]).expect("upsert 2");

    let snapshot = mt.snapshot_for_flush();
    assert_eq!(snapshot.indexes.len(), 1);
    let (index_id, kind, items) = &snapshot.indexes[0];
    assert_eq!(*index_id, 0);
    assert_eq!(*kind, IndexKind::Primary);
    assert_eq!(items.len(), 2);
    // Items must come out in (hash, bytes, length) order.
    let mut ordered = items.clone();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(items.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
               ordered.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>());
}
