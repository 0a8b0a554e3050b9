use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::row::{encode_table, EntryType, NeighborEntry};
use super::{NativeError, NeighborBackend};

/// In-process neighbor table with the same semantics as the OS one.
/// Used for simulations and tests; counts mutating calls and can be told
/// to reject them.
#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<Vec<NeighborEntry>>,
    flushes: AtomicUsize,
    creates: AtomicUsize,
    fail_reads: Mutex<Option<i32>>,
    fail_flush: Mutex<Option<i32>>,
    fail_create: Mutex<Option<i32>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: NeighborEntry) {
        self.rows.lock().push(entry);
    }

    pub fn rows(&self) -> Vec<NeighborEntry> {
        self.rows.lock().clone()
    }

    pub fn flush_calls(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn fail_reads_with(&self, code: Option<i32>) {
        *self.fail_reads.lock() = code;
    }

    pub fn fail_flush_with(&self, code: Option<i32>) {
        *self.fail_flush.lock() = code;
    }

    pub fn fail_create_with(&self, code: Option<i32>) {
        *self.fail_create.lock() = code;
    }
}

impl NeighborBackend for MemoryBackend {
    fn get_table(&self, buf: &mut [u8]) -> Result<usize, NativeError> {
        if let Some(code) = *self.fail_reads.lock() {
            return Err(NativeError::Code(code));
        }
        let rows = self.rows.lock();
        encode_table(&rows, buf).map_err(|required| NativeError::InsufficientBuffer { required })
    }

    fn flush_dynamic(&self, interface_index: u32) -> Result<(), NativeError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = *self.fail_flush.lock() {
            return Err(NativeError::Code(code));
        }
        self.rows
            .lock()
            .retain(|r| r.interface_index != interface_index || r.entry_type == EntryType::Static);
        Ok(())
    }

    fn create_entry(&self, entry: &NeighborEntry) -> Result<(), NativeError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = *self.fail_create.lock() {
            return Err(NativeError::Code(code));
        }
        let mut rows = self.rows.lock();
        rows.retain(|r| !(r.interface_index == entry.interface_index && r.ip == entry.ip));
        rows.push(*entry);
        Ok(())
    }
}
