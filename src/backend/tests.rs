use super::*;

#[test]
fn mem_backend_round_trips() {
    let backend = MemBackend::new(PAGE_SIZE);
    backend.write(0, b"hello").unwrap();
    assert_eq!(backend.read(0, 5).unwrap(), b"hello");
}

#[test]
fn mem_backend_rejects_out_of_bounds() {
    let backend = MemBackend::new(16);
    assert!(backend.write(10, b"0123456789").is_err());
    assert!(backend.read(10, 10).is_err());
}

#[test]
fn file_backend_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.bin");
    {
        let backend = FileBackend::open(&path, PAGE_SIZE * 2).unwrap();
        backend.write(PAGE_SIZE, b"second page").unwrap();
        backend.flush().unwrap();
    }
    let backend = FileBackend::open(&path, PAGE_SIZE * 2).unwrap();
    assert_eq!(backend.read(PAGE_SIZE, 11).unwrap(), b"second page");
}

#[test]
fn page_align_rounds_up() {
    assert_eq!(page_align(0), 0);
    assert_eq!(page_align(1), PAGE_SIZE);
    assert_eq!(page_align(PAGE_SIZE), PAGE_SIZE);
    assert_eq!(page_align(PAGE_SIZE + 1), PAGE_SIZE * 2);
}
