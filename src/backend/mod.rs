//! The backend layer: a fixed-size, byte-addressed random-access blob.
//!
//! Every other layer reads and writes through [`Backend`] rather than
//! touching a file descriptor directly — the same separation the teacher
//! codebase draws between its WAL/SSTable I/O (`std::fs::File` plus
//! `sync_all()`) and the higher layers that never see a raw `File`. Here the
//! separation is made explicit as a trait so an in-memory backend can stand
//! in for tests without touching disk at all.

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

/// Page size in bytes. All TOSDB block writes are page-aligned (§4.1).
pub const PAGE_SIZE: u64 = 4096;

/// Round `offset` up to the next multiple of [`PAGE_SIZE`].
pub fn page_align(offset: u64) -> u64 {
    offset.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// A fixed-size, byte-addressed random-access store.
///
/// `capacity()` is fixed across the lifetime of the backend: growing a store
/// means creating a new, larger backend and copying — TOSDB itself never
/// resizes one in place.
pub trait Backend: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns an I/O error if `offset + length > capacity()` or the
    /// underlying medium fails.
    fn read(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>>;

    /// Write `bytes` starting at `offset`. Not guaranteed durable until
    /// [`Backend::flush`] returns.
    fn write(&self, offset: u64, bytes: &[u8]) -> std::io::Result<()>;

    /// Flush any buffered writes so that previously written bytes are
    /// durable on disk-backed implementations.
    fn flush(&self) -> std::io::Result<()>;

    /// The fixed capacity of this backend, in bytes.
    fn capacity(&self) -> u64;
}

/// A disk-backed [`Backend`] over a pre-allocated, fixed-size file.
pub struct FileBackend {
    file: Mutex<File>,
    capacity: u64,
}

impl FileBackend {
    /// Open (creating if absent) a file at `path` and pre-allocate it to
    /// exactly `capacity` bytes via `set_len`.
    pub fn open<P: AsRef<Path>>(path: P, capacity: u64) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(capacity)?;
        tracing::debug!(capacity, "opened file backend");
        Ok(Self {
            file: Mutex::new(file),
            capacity,
        })
    }
}

impl Backend for FileBackend {
    fn read(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>> {
        if offset + length as u64 > self.capacity {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "read [{offset}, {}) exceeds capacity {}",
                    offset + length as u64,
                    self.capacity
                ),
            ));
        }
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf)?;
        tracing::trace!(offset, length, "backend read");
        Ok(buf)
    }

    fn write(&self, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
        if offset + bytes.len() as u64 > self.capacity {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "write [{offset}, {}) exceeds capacity {}",
                    offset + bytes.len() as u64,
                    self.capacity
                ),
            ));
        }
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        tracing::trace!(offset, len = bytes.len(), "backend write");
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        let file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.sync_all()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// An in-memory [`Backend`], used pervasively by the test suite in place of
/// a real file so unit tests don't pay filesystem cost.
pub struct MemBackend {
    data: Mutex<Vec<u8>>,
}

impl MemBackend {
    /// Create a zero-filled in-memory backend of exactly `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            data: Mutex::new(vec![0u8; capacity as usize]),
        }
    }
}

impl Backend for MemBackend {
    fn read(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>> {
        let data = self
            .data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let start = offset as usize;
        let end = start + length;
        if end > data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read [{start}, {end}) exceeds capacity {}", data.len()),
            ));
        }
        Ok(data[start..end].to_vec())
    }

    fn write(&self, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
        let mut data = self
            .data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("write [{start}, {end}) exceeds capacity {}", data.len()),
            ));
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn capacity(&self) -> u64 {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len() as u64
    }
}
