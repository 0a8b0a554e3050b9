// Linux neighbor table: reads /proc/net/arp, mutates through iproute2.

use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::process::Command;

use tracing::{debug, warn};

use super::row::{encode_table, EntryType, NeighborEntry};
use super::{NativeError, NeighborBackend};
use crate::models::domain::MacAddr;

const PROC_NET_ARP: &str = "/proc/net/arp";
const ATF_COM: u32 = 0x02;
const ATF_PERM: u32 = 0x04;
const EINVAL: i32 = 22;
const ENODEV: i32 = 19;

pub struct LinuxBackend {
    ip_binary: String,
}

impl LinuxBackend {
    pub fn new() -> Self {
        Self {
            ip_binary: "ip".to_string(),
        }
    }

    fn run_ip(&self, args: &[&str]) -> Result<(), NativeError> {
        debug!(cmd = %self.ip_binary, ?args, "running");
        let output = Command::new(&self.ip_binary)
            .args(args)
            .output()
            .map_err(io_code)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(?args, stderr = %stderr.trim(), "ip neigh command failed");
        Err(NativeError::Code(output.status.code().unwrap_or(-1)))
    }
}

impl Default for LinuxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborBackend for LinuxBackend {
    fn get_table(&self, buf: &mut [u8]) -> Result<usize, NativeError> {
        let text = fs::read_to_string(PROC_NET_ARP).map_err(io_code)?;
        let interfaces = pnet_datalink::interfaces();
        let rows = parse_proc_arp(&text, |name| {
            interfaces.iter().find(|i| i.name == name).map(|i| i.index)
        });
        encode_table(&rows, buf).map_err(|required| NativeError::InsufficientBuffer { required })
    }

    fn flush_dynamic(&self, interface_index: u32) -> Result<(), NativeError> {
        let name = interface_name(interface_index)?;
        // iproute2 leaves permanent and noarp entries alone unless asked
        self.run_ip(&["-4", "neigh", "flush", "dev", &name])
    }

    fn create_entry(&self, entry: &NeighborEntry) -> Result<(), NativeError> {
        let name = interface_name(entry.interface_index)?;
        let mac = entry.hardware_address().ok_or(NativeError::Code(EINVAL))?;
        let nud = match entry.entry_type {
            EntryType::Static => "permanent",
            _ => "reachable",
        };
        self.run_ip(&[
            "-4",
            "neigh",
            "replace",
            &entry.ip.to_string(),
            "lladdr",
            &mac.to_string().to_lowercase(),
            "dev",
            &name,
            "nud",
            nud,
        ])
    }
}

fn interface_name(index: u32) -> Result<String, NativeError> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|i| i.index == index)
        .map(|i| i.name)
        .ok_or(NativeError::Code(ENODEV))
}

fn io_code(e: io::Error) -> NativeError {
    NativeError::Code(e.raw_os_error().unwrap_or(-1))
}

/// Parses `/proc/net/arp`:
/// `IP address  HW type  Flags  HW address  Mask  Device`
pub(crate) fn parse_proc_arp<F>(text: &str, index_of: F) -> Vec<NeighborEntry>
where
    F: Fn(&str) -> Option<u32>,
{
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            let ip: Ipv4Addr = fields[0].parse().ok()?;
            let flags = u32::from_str_radix(fields[2].trim_start_matches("0x"), 16).ok()?;
            let mac: MacAddr = fields[3].parse().ok()?;
            let interface_index = index_of(fields[5])?;

            let entry_type = if flags & ATF_PERM != 0 {
                EntryType::Static
            } else if flags & ATF_COM != 0 {
                EntryType::Dynamic
            } else {
                EntryType::Invalid
            };
            Some(NeighborEntry::new(interface_index, mac, ip, entry_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
10.0.0.1         0x1         0x2         00:11:22:33:44:55     *        eth0
10.0.0.50        0x1         0x6         aa:bb:cc:dd:ee:01     *        eth0
10.0.0.77        0x1         0x0         00:00:00:00:00:00     *        eth0
172.17.0.2       0x1         0x2         02:42:ac:11:00:02     *        docker0
";

    fn index_of(name: &str) -> Option<u32> {
        match name {
            "eth0" => Some(2),
            "docker0" => Some(5),
            _ => None,
        }
    }

    #[test]
    fn parses_entries_and_flags() {
        let rows = parse_proc_arp(SAMPLE, index_of);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(rows[0].interface_index, 2);
        assert_eq!(rows[0].entry_type, EntryType::Dynamic);
        assert_eq!(
            rows[0].hardware_address(),
            Some(MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]))
        );
        assert_eq!(rows[1].entry_type, EntryType::Static);
        assert_eq!(rows[2].entry_type, EntryType::Invalid);
        assert_eq!(rows[2].hardware_address(), None);
        assert_eq!(rows[3].interface_index, 5);
    }

    #[test]
    fn skips_rows_on_unknown_devices() {
        let rows = parse_proc_arp(SAMPLE, |name| (name == "docker0").then_some(5));
        assert_eq!(rows.len(), 1);
    }
}
