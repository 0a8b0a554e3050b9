//! IPv4 neighbor (ARP) table access.
//!
//! Reads go through a two-phase protocol: a size probe with an empty buffer,
//! which is expected to fail with [`NativeError::InsufficientBuffer`], then a
//! fetch into a buffer of the reported size. Every lookup takes a fresh
//! snapshot; nothing is cached between calls.

mod memory;
mod row;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(windows)]
mod iphlpapi;

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::domain::MacAddr;

pub use memory::MemoryBackend;
pub use row::{decode_table, encode_table, table_len, EntryType, NeighborEntry, MAXLEN_PHYSADDR, ROW_LEN};

#[cfg(target_os = "linux")]
pub use linux::LinuxBackend;
#[cfg(windows)]
pub use iphlpapi::IpHelperBackend;

pub const ERROR_INSUFFICIENT_BUFFER: i32 = 122;

/// A fetch can race with the table growing after the probe.
const FETCH_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeError {
    /// The buffer cannot hold the table; retry with `required` bytes.
    InsufficientBuffer { required: usize },
    Code(i32),
}

impl NativeError {
    fn into_error(self, call: &'static str) -> Error {
        match self {
            NativeError::InsufficientBuffer { .. } => Error::native(call, ERROR_INSUFFICIENT_BUFFER),
            NativeError::Code(code) => Error::native(call, code),
        }
    }
}

/// OS primitives over the IPv4 neighbor table.
pub trait NeighborBackend: Send + Sync {
    /// Packs the table into `buf` (see [`encode_table`]) and returns the bytes written.
    fn get_table(&self, buf: &mut [u8]) -> std::result::Result<usize, NativeError>;

    /// Removes every non-static entry on the interface.
    fn flush_dynamic(&self, interface_index: u32) -> std::result::Result<(), NativeError>;

    fn create_entry(&self, entry: &NeighborEntry) -> std::result::Result<(), NativeError>;
}

#[derive(Clone)]
pub struct NeighborTable {
    backend: Arc<dyn NeighborBackend>,
}

impl NeighborTable {
    pub fn new(backend: Arc<dyn NeighborBackend>) -> Self {
        Self { backend }
    }

    /// The table of the running OS.
    pub fn system() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            Ok(Self::new(Arc::new(LinuxBackend::new())))
        }
        #[cfg(windows)]
        {
            Ok(Self::new(Arc::new(IpHelperBackend)))
        }
        #[cfg(not(any(target_os = "linux", windows)))]
        {
            Err(Error::Unsupported(
                "neighbor table access is only implemented for Linux and Windows".to_string(),
            ))
        }
    }

    pub fn snapshot_table(&self) -> Result<Vec<NeighborEntry>> {
        let mut required = match self.backend.get_table(&mut []) {
            Err(NativeError::InsufficientBuffer { required }) => required,
            // nothing to report, not even a header
            Ok(_) => return Ok(Vec::new()),
            Err(e) => return Err(e.into_error("GetIpNetTable")),
        };

        for attempt in 1..=FETCH_ATTEMPTS {
            let mut buf = vec![0u8; required];
            match self.backend.get_table(&mut buf) {
                Ok(written) => {
                    let entries = decode_table(&buf[..written.min(buf.len())]);
                    debug!(entries = entries.len(), bytes = required, "neighbor table snapshot");
                    return Ok(entries);
                }
                Err(NativeError::InsufficientBuffer { required: grown }) => {
                    debug!(attempt, required, grown, "neighbor table grew between probe and fetch");
                    required = grown;
                }
                Err(e) => return Err(e.into_error("GetIpNetTable")),
            }
        }
        Err(Error::native("GetIpNetTable", ERROR_INSUFFICIENT_BUFFER))
    }

    pub fn lookup_hardware_address(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        Ok(self
            .snapshot_table()?
            .iter()
            .filter(|entry| entry.ip == ip)
            .find_map(NeighborEntry::hardware_address))
    }

    /// Replaces the interface's dynamic entries with one static `gateway -> MAC`
    /// binding, using the MAC currently in the table. Flush runs before insert.
    ///
    /// Returns the frozen MAC. Nothing is flushed when the gateway has no entry.
    pub fn freeze_gateway_entry(&self, interface_index: u32, gateway: Ipv4Addr) -> Result<MacAddr> {
        let mac = self
            .lookup_hardware_address(gateway)?
            .ok_or(Error::GatewayMacUnresolved(gateway))?;

        self.backend
            .flush_dynamic(interface_index)
            .map_err(|e| e.into_error("FlushIpNetTable"))?;

        let entry = NeighborEntry::new(interface_index, mac, gateway, EntryType::Static);
        self.backend
            .create_entry(&entry)
            .map_err(|e| e.into_error("CreateIpNetEntry"))?;

        info!(%gateway, %mac, interface_index, "gateway entry frozen");
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn gateway() -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, 1)
    }

    fn router_mac() -> MacAddr {
        MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    fn seeded() -> (Arc<MemoryBackend>, NeighborTable) {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(NeighborEntry::new(3, router_mac(), gateway(), EntryType::Dynamic));
        backend.insert(NeighborEntry::new(
            3,
            MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]),
            Ipv4Addr::new(10, 0, 0, 50),
            EntryType::Dynamic,
        ));
        backend.insert(NeighborEntry::new(
            9,
            MacAddr([0x02, 0, 0, 0, 0, 0x09]),
            Ipv4Addr::new(192, 168, 5, 1),
            EntryType::Dynamic,
        ));
        let table = NeighborTable::new(backend.clone());
        (backend, table)
    }

    #[test]
    fn snapshot_returns_all_entries() {
        let (_, table) = seeded();
        assert_eq!(table.snapshot_table().unwrap().len(), 3);
    }

    #[test]
    fn snapshot_of_empty_table() {
        let table = NeighborTable::new(Arc::new(MemoryBackend::new()));
        assert!(table.snapshot_table().unwrap().is_empty());
    }

    #[test]
    fn lookup_reads_fresh_snapshot() {
        let (backend, table) = seeded();
        let ip = Ipv4Addr::new(10, 0, 0, 77);
        assert_eq!(table.lookup_hardware_address(ip).unwrap(), None);
        backend.insert(NeighborEntry::new(3, MacAddr([7; 6]), ip, EntryType::Dynamic));
        assert_eq!(table.lookup_hardware_address(ip).unwrap(), Some(MacAddr([7; 6])));
    }

    #[test]
    fn lookup_skips_incomplete_rows() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert(NeighborEntry::new(3, MacAddr::ZERO, gateway(), EntryType::Invalid));
        backend.insert(NeighborEntry::new(4, router_mac(), gateway(), EntryType::Dynamic));
        let table = NeighborTable::new(backend);
        assert_eq!(table.lookup_hardware_address(gateway()).unwrap(), Some(router_mac()));
    }

    #[test]
    fn freeze_flushes_interface_then_inserts_static() {
        let (backend, table) = seeded();
        let mac = table.freeze_gateway_entry(3, gateway()).unwrap();
        assert_eq!(mac, router_mac());

        let rows = backend.rows();
        let on_three: Vec<_> = rows.iter().filter(|r| r.interface_index == 3).collect();
        assert_eq!(on_three.len(), 1);
        assert_eq!(on_three[0].entry_type, EntryType::Static);
        assert_eq!(on_three[0].ip, gateway());
        // other interfaces untouched
        assert!(rows.iter().any(|r| r.interface_index == 9));
        assert_eq!(table.lookup_hardware_address(gateway()).unwrap(), Some(router_mac()));
    }

    #[test]
    fn freeze_without_gateway_entry_leaves_table_unchanged() {
        let (backend, table) = seeded();
        let before = backend.rows();
        let missing = Ipv4Addr::new(10, 0, 0, 254);
        match table.freeze_gateway_entry(3, missing) {
            Err(Error::GatewayMacUnresolved(ip)) => assert_eq!(ip, missing),
            other => panic!("expected GatewayMacUnresolved, got {:?}", other),
        }
        assert_eq!(backend.rows(), before);
        assert_eq!(backend.flush_calls(), 0);
        assert_eq!(backend.create_calls(), 0);
    }

    #[test]
    fn rejected_insert_surfaces_native_failure() {
        let (backend, table) = seeded();
        backend.fail_create_with(Some(5));
        match table.freeze_gateway_entry(3, gateway()) {
            Err(Error::NativeCallFailed { call, code }) => {
                assert_eq!(call, "CreateIpNetEntry");
                assert_eq!(code, 5);
            }
            other => panic!("expected NativeCallFailed, got {:?}", other),
        }
    }

    /// Reports a larger table on every fetch until `grow_times` is exhausted.
    struct GrowingBackend {
        inner: MemoryBackend,
        grow_times: Mutex<usize>,
    }

    impl NeighborBackend for GrowingBackend {
        fn get_table(&self, buf: &mut [u8]) -> std::result::Result<usize, NativeError> {
            if !buf.is_empty() {
                let mut left = self.grow_times.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(NativeError::InsufficientBuffer {
                        required: buf.len() + ROW_LEN,
                    });
                }
            }
            self.inner.get_table(buf)
        }

        fn flush_dynamic(&self, interface_index: u32) -> std::result::Result<(), NativeError> {
            self.inner.flush_dynamic(interface_index)
        }

        fn create_entry(&self, entry: &NeighborEntry) -> std::result::Result<(), NativeError> {
            self.inner.create_entry(entry)
        }
    }

    #[test]
    fn fetch_retries_when_table_grows() {
        let inner = MemoryBackend::new();
        inner.insert(NeighborEntry::new(3, router_mac(), gateway(), EntryType::Dynamic));
        let table = NeighborTable::new(Arc::new(GrowingBackend {
            inner,
            grow_times: Mutex::new(2),
        }));
        assert_eq!(table.snapshot_table().unwrap().len(), 1);
    }

    #[test]
    fn fetch_gives_up_after_repeated_growth() {
        let table = NeighborTable::new(Arc::new(GrowingBackend {
            inner: MemoryBackend::new(),
            grow_times: Mutex::new(FETCH_ATTEMPTS),
        }));
        // empty inner table still needs a header, so the probe asks for one
        match table.snapshot_table() {
            Err(Error::NativeCallFailed { code, .. }) => assert_eq!(code, ERROR_INSUFFICIENT_BUFFER),
            other => panic!("expected NativeCallFailed, got {:?}", other),
        }
    }

    #[test]
    fn probe_failure_is_fatal() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_reads_with(Some(87));
        let table = NeighborTable::new(backend);
        match table.snapshot_table() {
            Err(Error::NativeCallFailed { call, code }) => {
                assert_eq!(call, "GetIpNetTable");
                assert_eq!(code, 87);
            }
            other => panic!("expected NativeCallFailed, got {:?}", other),
        }
    }
}
