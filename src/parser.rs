// Pulls the sender hardware/protocol addresses out of Ethernet II + ARP frames.
// Anything that is not a well-formed Ethernet/IPv4 ARP payload is skipped.

use std::net::Ipv4Addr;

use etherparse::{EtherType, Ethernet2HeaderSlice};

use crate::models::domain::{MacAddr, ObservationRecord};

const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_PTYPE_IPV4: u16 = 0x0800;
const ARP_PAYLOAD_LEN: usize = 28;

pub fn parse_arp_frame(data: &[u8]) -> Option<ObservationRecord> {
    let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
    if eth.ether_type() != EtherType::ARP {
        return None;
    }
    parse_arp_payload(&data[eth.slice().len()..])
}

/// Decodes the fixed 28-byte Ethernet/IPv4 ARP body.
pub fn parse_arp_payload(payload: &[u8]) -> Option<ObservationRecord> {
    if payload.len() < ARP_PAYLOAD_LEN {
        return None;
    }
    let htype = u16::from_be_bytes([payload[0], payload[1]]);
    let ptype = u16::from_be_bytes([payload[2], payload[3]]);
    if htype != ARP_HTYPE_ETHERNET || ptype != ARP_PTYPE_IPV4 || payload[4] != 6 || payload[5] != 4 {
        return None;
    }

    // sha at 8..14, spa at 14..18
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&payload[8..14]);
    let sender_ip = Ipv4Addr::new(payload[14], payload[15], payload[16], payload[17]);

    Some(ObservationRecord {
        sender_mac: MacAddr(mac),
        sender_ip,
    })
}
