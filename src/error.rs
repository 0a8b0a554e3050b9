//! Error types for arpguard

use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type alias for arpguard operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Packet capture library failure
    #[error("Packet capture error: {0}")]
    Capture(#[from] pcap::Error),

    #[error("No interfaces found. Make sure libpcap/Npcap is properly installed on the local machine.")]
    NoDevices,

    #[error("Invalid device selection: {0}")]
    InvalidSelection(String),

    /// The selected adapter has no IPv4 interface index
    #[error("No IPv4 interface matches adapter '{0}'")]
    InterfaceUnresolved(String),

    /// No operational interface reports a default gateway
    #[error("No default gateway found on any interface that is up")]
    GatewayUnresolved,

    /// The gateway was never observed in the neighbor table, so there is nothing to freeze
    #[error("Gateway {0} has no hardware address in the neighbor table")]
    GatewayMacUnresolved(Ipv4Addr),

    #[error("{call} failed with code {code}")]
    NativeCallFailed { call: &'static str, code: i32 },

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn native(call: &'static str, code: i32) -> Self {
        Error::NativeCallFailed { call, code }
    }

    /// Resolution failures abort the current attempt without touching OS state.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::InterfaceUnresolved(_) | Error::GatewayUnresolved | Error::GatewayMacUnresolved(_)
        )
    }
}
