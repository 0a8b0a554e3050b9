use std::net::{IpAddr, Ipv4Addr};

use pnet_datalink::NetworkInterface;
use tracing::warn;

use super::{InterfaceInventory, InterfaceRecord};
use crate::error::Result;

/// Interfaces from the OS, with default gateways taken from the routing table.
pub struct SystemInventory;

impl InterfaceInventory for SystemInventory {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>> {
        let interfaces = pnet_datalink::interfaces();
        let routes = default_routes(&interfaces).unwrap_or_else(|e| {
            warn!("Failed to read routing table: {}", e);
            Vec::new()
        });

        Ok(interfaces
            .iter()
            .map(|iface| InterfaceRecord {
                name: iface.name.clone(),
                index: iface.index,
                is_up: iface.is_up(),
                ipv4: iface
                    .ips
                    .iter()
                    .filter_map(|net| match net.ip() {
                        IpAddr::V4(v4) => Some(v4),
                        IpAddr::V6(_) => None,
                    })
                    .collect(),
                gateways: routes
                    .iter()
                    .filter(|(index, _)| *index == iface.index)
                    .map(|(_, gw)| IpAddr::V4(*gw))
                    .collect(),
            })
            .collect())
    }
}

#[cfg(target_os = "linux")]
fn default_routes(interfaces: &[NetworkInterface]) -> Result<Vec<(u32, Ipv4Addr)>> {
    let text = std::fs::read_to_string("/proc/net/route")?;
    Ok(parse_proc_route(&text)
        .into_iter()
        .filter_map(|(name, gw)| {
            interfaces
                .iter()
                .find(|i| i.name == name)
                .map(|i| (i.index, gw))
        })
        .collect())
}

#[cfg(windows)]
fn default_routes(_interfaces: &[NetworkInterface]) -> Result<Vec<(u32, Ipv4Addr)>> {
    use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_NO_DATA, NO_ERROR};
    use windows::Win32::NetworkManagement::IpHelper::{GetIpForwardTable, MIB_IPFORWARDTABLE};

    use crate::error::Error;

    unsafe {
        let mut size: u32 = 0;
        let rc = GetIpForwardTable(None, &mut size, false);
        if rc == ERROR_NO_DATA.0 {
            return Ok(Vec::new());
        }
        if rc != ERROR_INSUFFICIENT_BUFFER.0 {
            return Err(Error::native("GetIpForwardTable", rc as i32));
        }

        // u32 words keep the table header and rows 4-byte aligned
        let mut buffer = vec![0u32; (size as usize).div_ceil(4)];
        let table = buffer.as_mut_ptr() as *mut MIB_IPFORWARDTABLE;
        let rc = GetIpForwardTable(Some(table), &mut size, false);
        if rc != NO_ERROR.0 {
            return Err(Error::native("GetIpForwardTable", rc as i32));
        }

        let count = (*table).dwNumEntries as usize;
        let rows = std::slice::from_raw_parts((*table).table.as_ptr(), count);
        Ok(rows
            .iter()
            .filter(|row| row.dwForwardDest == 0 && row.dwForwardMask == 0 && row.dwForwardNextHop != 0)
            .map(|row| {
                (
                    row.dwForwardIfIndex,
                    Ipv4Addr::from(row.dwForwardNextHop.to_ne_bytes()),
                )
            })
            .collect())
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
fn default_routes(_interfaces: &[NetworkInterface]) -> Result<Vec<(u32, Ipv4Addr)>> {
    Ok(Vec::new())
}

/// Default routes from `/proc/net/route` as `(device, gateway)`.
/// Addresses are the kernel's network-order u32 printed in host order.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_route(text: &str) -> Vec<(String, Ipv4Addr)> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields[1] != "00000000" {
                return None;
            }
            let gateway = u32::from_str_radix(fields[2], 16).ok()?;
            if gateway == 0 {
                return None;
            }
            Some((fields[0].to_string(), Ipv4Addr::from(gateway.to_ne_bytes())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_endian = "little")]
    fn parses_default_routes_only() {
        let text = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0100000A\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0000000A\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
wlan0\t00000000\t0101A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0
";
        assert_eq!(
            parse_proc_route(text),
            vec![
                ("eth0".to_string(), Ipv4Addr::new(10, 0, 0, 1)),
                ("wlan0".to_string(), Ipv4Addr::new(192, 168, 1, 1)),
            ]
        );
    }

    #[test]
    #[cfg(windows)]
    fn reads_live_forward_table() {
        let routes = default_routes(&[]).unwrap();
        assert!(routes.iter().all(|(_, gateway)| !gateway.is_unspecified()));
    }
}
