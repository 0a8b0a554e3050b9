//! Passive ARP cache-poisoning detection with one-shot gateway pinning.
//!
//! ARP frames from the capture thread feed an [`ArpAnomalyDetector`], which
//! counts announcements per sender hardware address. A
//! [`MitigationCoordinator`] running on its own task watches the detector and,
//! the first time a sender exceeds the threshold, replaces the adapter's
//! dynamic neighbor entries with a static one for the default gateway.
//!
//! ```no_run
//! use std::sync::Arc;
//! use arpguard::{ArpAnomalyDetector, GatewayLocator, MitigationCoordinator, NeighborTable, Shutdown};
//! use arpguard::mitigation::MitigationSettings;
//!
//! # async fn demo() -> arpguard::Result<()> {
//! let detector = Arc::new(ArpAnomalyDetector::default());
//! let (tx, _rx) = crossbeam_channel::unbounded();
//! let settings = MitigationSettings { adapter: "eth0".into(), ..Default::default() };
//! let coordinator = MitigationCoordinator::new(
//!     detector.clone(),
//!     GatewayLocator::system(),
//!     NeighborTable::system()?,
//!     settings,
//!     tx,
//! );
//! coordinator.run(Shutdown::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod gateway;
pub mod mitigation;
pub mod models;
pub mod neighbor;
pub mod parser;
pub mod report;
pub mod shutdown;
pub mod sniff;

pub use detection::{ArpAnomalyDetector, DetectorSettings};
pub use error::{Error, Result};
pub use gateway::GatewayLocator;
pub use mitigation::{MitigationCoordinator, MitigationState};
pub use models::domain::{MacAddr, ObservationRecord};
pub use models::dto::Alert;
pub use neighbor::NeighborTable;
pub use shutdown::Shutdown;
