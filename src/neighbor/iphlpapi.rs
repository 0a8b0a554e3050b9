// IP Helper neighbor table. The buffer layout returned by GetIpNetTable is
// MIB_IPNETTABLE, which is exactly what `decode_table` reads.

use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_NO_DATA, NO_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    CreateIpNetEntry, FlushIpNetTable, GetIpNetTable, MIB_IPNETROW_LH, MIB_IPNETROW_LH_0,
    MIB_IPNETTABLE,
};

use super::row::NeighborEntry;
use super::{NativeError, NeighborBackend};

pub struct IpHelperBackend;

impl NeighborBackend for IpHelperBackend {
    fn get_table(&self, buf: &mut [u8]) -> Result<usize, NativeError> {
        let mut size = buf.len() as u32;
        let table = if buf.is_empty() {
            None
        } else {
            Some(buf.as_mut_ptr() as *mut MIB_IPNETTABLE)
        };

        let rc = unsafe { GetIpNetTable(table, &mut size, false) };
        match rc {
            rc if rc == NO_ERROR.0 => Ok(buf.len()),
            // empty table: nothing written, decodes to no rows
            rc if rc == ERROR_NO_DATA.0 => Ok(0),
            rc if rc == ERROR_INSUFFICIENT_BUFFER.0 => Err(NativeError::InsufficientBuffer {
                required: size as usize,
            }),
            rc => Err(NativeError::Code(rc as i32)),
        }
    }

    fn flush_dynamic(&self, interface_index: u32) -> Result<(), NativeError> {
        let rc = unsafe { FlushIpNetTable(interface_index) };
        if rc == NO_ERROR.0 {
            Ok(())
        } else {
            Err(NativeError::Code(rc as i32))
        }
    }

    fn create_entry(&self, entry: &NeighborEntry) -> Result<(), NativeError> {
        let row = MIB_IPNETROW_LH {
            dwIndex: entry.interface_index,
            dwPhysAddrLen: entry.phys_len,
            bPhysAddr: entry.phys_addr,
            dwAddr: u32::from_ne_bytes(entry.ip.octets()),
            Anonymous: MIB_IPNETROW_LH_0 {
                dwType: entry.entry_type.code(),
            },
        };
        let rc = unsafe { CreateIpNetEntry(&row) };
        if rc == NO_ERROR.0 {
            Ok(())
        } else {
            Err(NativeError::Code(rc as i32))
        }
    }
}
