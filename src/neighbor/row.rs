//! Fixed-layout neighbor rows, packed the way the IP Helper table is:
//! a 4-byte entry count followed by 24-byte rows.

use std::net::Ipv4Addr;

use crate::models::domain::MacAddr;

pub const MAXLEN_PHYSADDR: usize = 8;
pub const ROW_LEN: usize = 24;
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Other,
    Invalid,
    Dynamic,
    Static,
}

impl EntryType {
    pub fn code(self) -> u32 {
        match self {
            EntryType::Other => 1,
            EntryType::Invalid => 2,
            EntryType::Dynamic => 3,
            EntryType::Static => 4,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            2 => EntryType::Invalid,
            3 => EntryType::Dynamic,
            4 => EntryType::Static,
            _ => EntryType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub interface_index: u32,
    pub phys_len: u32,
    pub phys_addr: [u8; MAXLEN_PHYSADDR],
    pub ip: Ipv4Addr,
    pub entry_type: EntryType,
}

impl NeighborEntry {
    pub fn new(interface_index: u32, mac: MacAddr, ip: Ipv4Addr, entry_type: EntryType) -> Self {
        let mut phys_addr = [0u8; MAXLEN_PHYSADDR];
        phys_addr[..6].copy_from_slice(&mac.0);
        Self {
            interface_index,
            phys_len: 6,
            phys_addr,
            ip,
            entry_type,
        }
    }

    /// The Ethernet address, if the row holds a complete one.
    pub fn hardware_address(&self) -> Option<MacAddr> {
        if self.phys_len != 6 {
            return None;
        }
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.phys_addr[..6]);
        let mac = MacAddr(mac);
        (!mac.is_zero()).then_some(mac)
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.interface_index.to_ne_bytes());
        out[4..8].copy_from_slice(&self.phys_len.to_ne_bytes());
        out[8..16].copy_from_slice(&self.phys_addr);
        // network order inside the record
        out[16..20].copy_from_slice(&self.ip.octets());
        out[20..24].copy_from_slice(&self.entry_type.code().to_ne_bytes());
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < ROW_LEN {
            return None;
        }
        let u32_at = |at: usize| u32::from_ne_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut phys_addr = [0u8; MAXLEN_PHYSADDR];
        phys_addr.copy_from_slice(&raw[8..16]);
        Some(Self {
            interface_index: u32_at(0),
            phys_len: u32_at(4).min(MAXLEN_PHYSADDR as u32),
            phys_addr,
            ip: Ipv4Addr::new(raw[16], raw[17], raw[18], raw[19]),
            entry_type: EntryType::from_code(u32_at(20)),
        })
    }
}

pub fn table_len(rows: usize) -> usize {
    HEADER_LEN + rows * ROW_LEN
}

/// Packs `rows` into `buf`. Returns the bytes needed when `buf` is too small.
pub fn encode_table(rows: &[NeighborEntry], buf: &mut [u8]) -> Result<usize, usize> {
    let needed = table_len(rows.len());
    if buf.len() < needed {
        return Err(needed);
    }
    buf[..HEADER_LEN].copy_from_slice(&(rows.len() as u32).to_ne_bytes());
    for (i, row) in rows.iter().enumerate() {
        let at = HEADER_LEN + i * ROW_LEN;
        row.encode(&mut buf[at..at + ROW_LEN]);
    }
    Ok(needed)
}

/// Unpacks a table; trailing rows that do not fit in `buf` are dropped.
pub fn decode_table(buf: &[u8]) -> Vec<NeighborEntry> {
    if buf.len() < HEADER_LEN {
        return Vec::new();
    }
    let count = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    buf[HEADER_LEN..]
        .chunks_exact(ROW_LEN)
        .take(count)
        .filter_map(NeighborEntry::decode)
        .collect()
}
