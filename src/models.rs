pub mod domain {
    use std::fmt;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    use serde::{Serialize, Serializer};

    /// 48-bit link-layer address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct MacAddr(pub [u8; 6]);

    impl MacAddr {
        pub const ZERO: MacAddr = MacAddr([0; 6]);

        pub fn octets(&self) -> [u8; 6] {
            self.0
        }

        pub fn is_zero(&self) -> bool {
            self.0 == [0; 6]
        }
    }

    impl From<[u8; 6]> for MacAddr {
        fn from(bytes: [u8; 6]) -> Self {
            MacAddr(bytes)
        }
    }

    impl fmt::Display for MacAddr {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let b = &self.0;
            write!(
                f,
                "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
                b[0], b[1], b[2], b[3], b[4], b[5]
            )
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ParseMacError(pub String);

    impl fmt::Display for ParseMacError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "invalid hardware address '{}'", self.0)
        }
    }

    impl std::error::Error for ParseMacError {}

    impl FromStr for MacAddr {
        type Err = ParseMacError;

        /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`.
        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let err = || ParseMacError(s.to_string());
            let mut bytes = [0u8; 6];
            let mut parts = s.split(|c| c == ':' || c == '-');
            for byte in bytes.iter_mut() {
                let part = parts.next().ok_or_else(err)?;
                if part.len() != 2 {
                    return Err(err());
                }
                *byte = u8::from_str_radix(part, 16).map_err(|_| err())?;
            }
            if parts.next().is_some() {
                return Err(err());
            }
            Ok(MacAddr(bytes))
        }
    }

    impl Serialize for MacAddr {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    /// Sender fields pulled out of one ARP frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObservationRecord {
        pub sender_mac: MacAddr,
        pub sender_ip: Ipv4Addr,
    }

    /// Per-sender observation count.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HardwareAddressStat {
        pub address: MacAddr,
        pub count: u64,
    }
}

pub mod dto {
    use std::fmt;
    use std::net::Ipv4Addr;

    use chrono::{DateTime, Utc};
    use serde::Serialize;

    use super::domain::MacAddr;

    /// Emitted once, when the gateway entry has been frozen.
    #[derive(Debug, Serialize, Clone)]
    pub struct Alert {
        pub timestamp: DateTime<Utc>,
        pub offender: MacAddr,
        pub count: u64,
        pub claimed_ips: Vec<Ipv4Addr>,
        pub interface_index: u32,
        pub gateway: Ipv4Addr,
        pub gateway_mac: MacAddr,
    }

    impl fmt::Display for Alert {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "WARNING")?;
            writeln!(
                f,
                "\t{} seems to be attempting to wipe the network cache.",
                self.offender
            )?;
            writeln!(
                f,
                "\tHas {} packets sent with same hardware address",
                self.count
            )?;
            if !self.claimed_ips.is_empty() {
                let ips: Vec<String> = self.claimed_ips.iter().map(|ip| ip.to_string()).collect();
                writeln!(f, "\tClaimed addresses: {}", ips.join(", "))?;
            }
            write!(
                f,
                "\tFroze {} -> {} on interface {}",
                self.gateway, self.gateway_mac, self.interface_index
            )
        }
    }
}
