use crate::catalog::IndexKind;
use crate::memtable::{IndexKeySpec, Memtable, MemtableError};
use tempfile::tempdir;

fn primary_key(index_id: u32, key: &[u8]) -> IndexKeySpec {
    IndexKeySpec {
        index_id,
        kind: IndexKind::Primary,
        key_bytes: key.to_vec(),
        primary_key: Vec::new(),
    }
}

#[test]
fn upsert_then_get_returns_value_offset() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    let id = mt.next_record_id();
    mt.upsert(id, b"hello world", vec![primary_key(0, b"k1")])
        .expect("upsert");

    let entry = mt.get(0, b"k1").expect("present");
    assert_eq!(entry.record_id, id);
    assert!(!entry.deleted);
    let value = mt.read_value(entry.value_offset, entry.value_length);
    assert_eq!(value, b"hello world");
}

#[test]
fn missing_key_returns_none() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    assert!(mt.get(0, b"nope").is_none());
}

#[test]
fn overwrite_replaces_previous_value() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    let id1 = mt.next_record_id();
    mt.upsert(id1, b"v1", vec![primary_key(0, b"k1")]).expect("upsert 1");
    let id2 = mt.next_record_id();
    mt.upsert(id2, b"v2", vec![primary_key(0, b"k1")]).expect("upsert 2");

    let entry = mt.get(0, b"k1").expect("present");
    assert_eq!(entry.record_id, id2);
    assert_eq!(mt.read_value(entry.value_offset, entry.value_length), b"v2");
}

#[test]
fn delete_marks_tombstone() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
    let id = mt.next_record_id();
    mt.upsert(id, b"v1", vec![primary_key(0, b"k1")]).expect("upsert");
    mt.delete(id, vec![primary_key(0, b"k1")]).expect("delete");

    let entry = mt.get(0, b"k1").expect("tombstone still resolvable");
    assert!(entry.deleted);
}

#[test]
fn flush_required_when_value_log_cap_exceeded() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1000, 8).expect("open");
    let id = mt.next_record_id();
    let err = mt
        .upsert(id, b"this value is far longer than eight bytes", vec![primary_key(0, b"k1")])
        .unwrap_err();
    assert!(matches!(err, MemtableError::FlushRequired));
}

#[test]
fn flush_required_when_record_count_cap_exceeded() {
    let dir = tempdir().expect("tempdir");
    let mt = Memtable::open(dir.path(), 0, 1, 1 << 20).expect("open");
    let id1 = mt.next_record_id();
    mt.upsert(id1, b"v1", vec![primary_key(0, b"k1")]).expect("first fits");
    let id2 = mt.next_record_id();
    let err = mt.upsert(id2, b"v2", vec![primary_key(0, b"k2")]).unwrap_err();
    assert!(matches!(err, MemtableError::FlushRequired));
}

#[test]
fn reopen_replays_wal_into_identical_state() {
    let dir = tempdir().expect("tempdir");
    let id;
    {
        let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("open");
        id = mt.next_record_id();
        mt.upsert(id, b"persisted", vec![primary_key(0, b"k1")]).expect("upsert");
    }
    let mt = Memtable::open(dir.path(), 0, 1000, 1 << 20).expect("reopen");
    let entry = mt.get(0, b"k1").expect("replayed");
    assert_eq!(entry.record_id, id);
    assert_eq!(mt.read_value(entry.value_offset, entry.value_length), b"persisted");
}
