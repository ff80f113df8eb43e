use tempfile::tempdir;

use crate::block::BlockError;
use crate::catalog::IndexKind;
use crate::compression::CODEC_NONE;
use crate::memtable::{IndexKeySpec, Memtable};
use crate::sstable::{SSTable, SSTableError, write_sstable};

fn primary_key(key: &[u8]) -> IndexKeySpec {
    IndexKeySpec {
        index_id: 0,
        kind: IndexKind::Primary,
        key_bytes: key.to_vec(),
        primary_key: Vec::new(),
    }
}

fn build_single_key_sstable(sst_dir: &std::path::Path, wal_dir: &std::path::Path) -> crate::sstable::SstableListItem {
    let mt = Memtable::open(wal_dir, 0, 1000, 1 << 20).expect("open memtable");
    let id = mt.next_record_id();
    mt.upsert(id, b"payload", vec![primary_key(b"k1")]).expect("upsert");
    let snapshot = mt.snapshot_for_flush();
    write_sstable(sst_dir, 1, 0, mt.record_count(), &snapshot, CODEC_NONE).expect("write sstable")
}

#[test]
fn corrupted_index_block_fails_open_with_checksum_mismatch() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let list_item = build_single_key_sstable(sst_dir.path(), wal_dir.path());

    let (_, index_location, _) = list_item.indexes[0];
    let mut bytes = std::fs::read(&list_item.path).expect("read sst file");
    let flip_at = index_location as usize + 20;
    bytes[flip_at] ^= 0xFF;
    std::fs::write(&list_item.path, &bytes).expect("rewrite sst file");

    let err = SSTable::open(list_item).expect_err("corrupted index block must fail to open");
    assert!(matches!(err, SSTableError::Block(BlockError::ChecksumMismatch)));
}

#[test]
fn corrupted_data_block_fails_decode_with_checksum_mismatch() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let list_item = build_single_key_sstable(sst_dir.path(), wal_dir.path());

    let mut bytes = std::fs::read(&list_item.path).expect("read sst file");
    // The value-log block is written first, so flipping a byte well inside
    // its payload corrupts it without touching the index blocks that follow.
    let flip_at = list_item.valuelog_location as usize + 40;
    bytes[flip_at] ^= 0xFF;
    std::fs::write(&list_item.path, &bytes).expect("rewrite sst file");

    let sst = SSTable::open(list_item).expect("index blocks are untouched, open still succeeds");
    let err = sst.decompressed_valuelog().expect_err("corrupted valuelog must fail to decode");
    assert!(matches!(err, SSTableError::Block(BlockError::ChecksumMismatch)));
}

#[test]
fn lookup_on_unknown_index_id_returns_index_not_found() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let list_item = build_single_key_sstable(sst_dir.path(), wal_dir.path());
    let sst = SSTable::open(list_item).expect("open sstable");

    let err = sst.decoded_index(99).expect_err("index 99 does not exist");
    assert!(matches!(err, SSTableError::IndexNotFound(99)));
    assert!(!sst.may_contain(99, b"k1"));
}

#[test]
fn out_of_bounds_key_is_rejected_without_decoding() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let list_item = build_single_key_sstable(sst_dir.path(), wal_dir.path());
    let sst = SSTable::open(list_item).expect("open sstable");

    assert!(!sst.may_contain(0, b"this-key-is-far-outside-the-single-entry-bounds"));
    assert_eq!(sst.get(0, b"this-key-is-far-outside-the-single-entry-bounds").expect("lookup ok"), None);
}

#[test]
fn write_sstable_is_only_visible_at_its_final_path() {
    let wal_dir = tempdir().expect("wal dir");
    let sst_dir = tempdir().expect("sst dir");
    let list_item = build_single_key_sstable(sst_dir.path(), wal_dir.path());

    assert!(list_item.path.exists());
    assert!(!list_item.path.with_extension("dat.tmp").exists());
    let mut entries: Vec<_> = std::fs::read_dir(sst_dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name())
        .collect();
    entries.sort();
    assert_eq!(entries, vec![std::ffi::OsString::from("sst-1.dat")]);
}
