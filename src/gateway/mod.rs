//! Active adapter and default gateway resolution.

mod system;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;

pub use system::SystemInventory;

/// Index value meaning "no IPv4 interface matched".
pub const UNRESOLVED_INDEX: u32 = 0;

/// One adapter as the OS reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub name: String,
    pub index: u32,
    pub is_up: bool,
    pub ipv4: Vec<Ipv4Addr>,
    pub gateways: Vec<IpAddr>,
}

impl InterfaceRecord {
    pub fn supports_ipv4(&self) -> bool {
        !self.ipv4.is_empty()
    }
}

pub trait InterfaceInventory: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>>;
}

/// The identifier an adapter is matched by. Npcap names devices
/// `\Device\NPF_{GUID}`; the GUID is the adapter id.
pub fn adapter_identifier(device_name: &str) -> &str {
    device_name
        .rsplit_once("NPF_")
        .map_or(device_name, |(_, id)| id)
}

/// Fixed interface list, swappable at runtime.
#[derive(Default)]
pub struct StaticInventory {
    records: RwLock<Vec<InterfaceRecord>>,
}

impl StaticInventory {
    pub fn new(records: Vec<InterfaceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn replace(&self, records: Vec<InterfaceRecord>) {
        *self.records.write() = records;
    }
}

impl InterfaceInventory for StaticInventory {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>> {
        Ok(self.records.read().clone())
    }
}

/// Every call re-reads the inventory; the active adapter or gateway may change
/// while the process runs.
#[derive(Clone)]
pub struct GatewayLocator {
    inventory: Arc<dyn InterfaceInventory>,
}

impl GatewayLocator {
    pub fn new(inventory: Arc<dyn InterfaceInventory>) -> Self {
        Self { inventory }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemInventory))
    }

    /// IPv4 index of the adapter whose identifier matches (ignoring case),
    /// or [`UNRESOLVED_INDEX`].
    pub fn resolve_active_interface_index(&self, adapter: &str) -> Result<u32> {
        let wanted = adapter_identifier(adapter);
        let mut index = UNRESOLVED_INDEX;
        for record in self.inventory.interfaces()? {
            if !record.supports_ipv4() {
                continue;
            }
            if !adapter_identifier(&record.name).eq_ignore_ascii_case(wanted) {
                continue;
            }
            index = record.index;
        }
        debug!(adapter, index, "resolved interface index");
        Ok(index)
    }

    /// Every IPv4 gateway on an interface that is up, in inventory order.
    pub fn gateway_candidates(&self) -> Result<Vec<(u32, Ipv4Addr)>> {
        Ok(self
            .inventory
            .interfaces()?
            .into_iter()
            .filter(|record| record.is_up)
            .flat_map(|record| {
                let index = record.index;
                record.gateways.into_iter().filter_map(move |gw| match gw {
                    IpAddr::V4(v4) => Some((index, v4)),
                    IpAddr::V6(_) => None,
                })
            })
            .collect())
    }

    /// The last candidate wins when several interfaces report a gateway.
    pub fn resolve_default_gateway(&self) -> Result<Option<Ipv4Addr>> {
        let candidates = self.gateway_candidates()?;
        if candidates.len() > 1 {
            debug!(?candidates, "multiple gateways, taking the last");
        }
        Ok(candidates.last().map(|(_, gw)| *gw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, index: u32, is_up: bool, gateways: &[&str]) -> InterfaceRecord {
        InterfaceRecord {
            name: name.to_string(),
            index,
            is_up,
            ipv4: vec![Ipv4Addr::new(10, 0, 0, index as u8)],
            gateways: gateways.iter().map(|g| g.parse().unwrap()).collect(),
        }
    }

    fn locator(records: Vec<InterfaceRecord>) -> GatewayLocator {
        GatewayLocator::new(Arc::new(StaticInventory::new(records)))
    }

    #[test]
    fn identifier_strips_npcap_prefix() {
        assert_eq!(
            adapter_identifier(r"\Device\NPF_{1A2B-3C}"),
            "{1A2B-3C}"
        );
        assert_eq!(adapter_identifier("eth0"), "eth0");
    }

    #[test]
    fn resolves_index_case_insensitively() {
        let locator = locator(vec![
            record(r"\Device\NPF_{ABCD}", 12, true, &[]),
            record("eth0", 2, true, &[]),
        ]);
        assert_eq!(locator.resolve_active_interface_index(r"\Device\NPF_{abcd}").unwrap(), 12);
        assert_eq!(locator.resolve_active_interface_index("ETH0").unwrap(), 2);
    }

    #[test]
    fn unmatched_or_ipv6_only_adapter_is_unresolved() {
        let mut v6_only = record("wg0", 7, true, &[]);
        v6_only.ipv4.clear();
        let locator = locator(vec![v6_only, record("eth0", 2, true, &[])]);
        assert_eq!(locator.resolve_active_interface_index("wg0").unwrap(), UNRESOLVED_INDEX);
        assert_eq!(locator.resolve_active_interface_index("eth9").unwrap(), UNRESOLVED_INDEX);
    }

    #[test]
    fn last_gateway_on_up_interfaces_wins() {
        let locator = locator(vec![
            record("eth0", 2, true, &["10.0.0.1"]),
            record("eth1", 3, false, &["172.16.0.1"]),
            record("tun0", 4, true, &["192.168.100.1", "fe80::1"]),
        ]);
        assert_eq!(
            locator.gateway_candidates().unwrap(),
            vec![
                (2, Ipv4Addr::new(10, 0, 0, 1)),
                (4, Ipv4Addr::new(192, 168, 100, 1))
            ]
        );
        assert_eq!(
            locator.resolve_default_gateway().unwrap(),
            Some(Ipv4Addr::new(192, 168, 100, 1))
        );
    }

    #[test]
    fn no_gateway_when_nothing_is_up() {
        let locator = locator(vec![record("eth0", 2, false, &["10.0.0.1"])]);
        assert_eq!(locator.resolve_default_gateway().unwrap(), None);
    }
}
