//! One-shot gateway freeze driven by the detector.
//!
//! The coordinator runs as its own task. It wakes on a fixed period, or as
//! soon as the detector signals a threshold crossing, and while still
//! [`MitigationState::Armed`] it pins the gateway's neighbor entry. Neighbor
//! table calls block, so they run on the blocking pool and never on the
//! capture thread.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::Sender;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::detection::ArpAnomalyDetector;
use crate::error::{Error, Result};
use crate::gateway::{GatewayLocator, UNRESOLVED_INDEX};
use crate::models::domain::{HardwareAddressStat, MacAddr};
use crate::models::dto::Alert;
use crate::neighbor::NeighborTable;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MitigationSettings {
    /// Capture device name of the adapter being protected.
    pub adapter: String,
    /// Freeze this gateway instead of the discovered one.
    pub gateway_override: Option<Ipv4Addr>,
    pub poll_interval: Duration,
    /// A failed attempt is not retried before this much time has passed.
    pub retry_backoff: Duration,
}

impl Default for MitigationSettings {
    fn default() -> Self {
        Self {
            adapter: String::new(),
            gateway_override: None,
            poll_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MitigationState {
    Armed,
    /// Terminal for the life of the process.
    Mitigated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrozenGateway {
    interface_index: u32,
    gateway: Ipv4Addr,
    gateway_mac: MacAddr,
}

pub struct MitigationCoordinator {
    detector: Arc<ArpAnomalyDetector>,
    locator: GatewayLocator,
    table: NeighborTable,
    settings: MitigationSettings,
    alerts: Sender<Alert>,
    state: MitigationState,
    last_failure: Option<Instant>,
    attempts: u32,
}

impl MitigationCoordinator {
    pub fn new(
        detector: Arc<ArpAnomalyDetector>,
        locator: GatewayLocator,
        table: NeighborTable,
        settings: MitigationSettings,
        alerts: Sender<Alert>,
    ) -> Self {
        Self {
            detector,
            locator,
            table,
            settings,
            alerts,
            state: MitigationState::Armed,
            last_failure: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> MitigationState {
        self.state
    }

    pub fn is_alerted(&self) -> bool {
        self.state == MitigationState::Mitigated
    }

    /// Mitigation attempts made so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// One check of the detector. Returns `None` when nothing was attempted,
    /// otherwise the outcome of the attempt.
    ///
    /// The state only moves to `Mitigated` once the freeze has succeeded.
    pub async fn poll_once(&mut self) -> Option<Result<Alert>> {
        if self.state == MitigationState::Mitigated || !self.detector.is_suspicious() {
            return None;
        }
        if let Some(failed_at) = self.last_failure {
            if failed_at.elapsed() < self.settings.retry_backoff {
                return None;
            }
        }
        let offender = self.detector.most_suspicious_address()?;
        self.attempts += 1;

        warn!(
            "{} seems to be attempting to wipe the network cache ({} packets sent with same hardware address). Flushing and Freezing...",
            offender.address, offender.count
        );

        let locator = self.locator.clone();
        let table = self.table.clone();
        let adapter = self.settings.adapter.clone();
        let gateway_override = self.settings.gateway_override;
        let suspect = offender.address;
        let outcome = tokio::task::spawn_blocking(move || {
            freeze_gateway(&locator, &table, &adapter, gateway_override, suspect)
        })
        .await
        .map_err(|e| Error::TaskFailed(e.to_string()))
        .and_then(|result| result);

        match outcome {
            Ok(frozen) => {
                self.state = MitigationState::Mitigated;
                let alert = self.build_alert(offender, frozen);
                if self.alerts.send(alert.clone()).is_err() {
                    debug!("alert receiver dropped");
                }
                Some(Ok(alert))
            }
            Err(e) => {
                if e.is_resolution_failure() {
                    error!("Mitigation aborted, neighbor table untouched: {}", e);
                } else {
                    error!("Mitigation failed: {}", e);
                }
                self.last_failure = Some(Instant::now());
                Some(Err(e))
            }
        }
    }

    /// Polls until shutdown. After a successful freeze the loop only waits
    /// for shutdown; capture and detection keep running.
    pub async fn run(mut self, shutdown: Shutdown) -> MitigationState {
        info!("Counter started...");
        let detector = Arc::clone(&self.detector);
        let mut interval = time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state == MitigationState::Armed {
            tokio::select! {
                _ = shutdown.wait() => return self.state,
                _ = interval.tick() => {}
                _ = detector.threshold_crossed() => debug!("woken by threshold crossing"),
            }
            self.poll_once().await;
        }

        shutdown.wait().await;
        self.state
    }

    fn build_alert(&self, offender: HardwareAddressStat, frozen: FrozenGateway) -> Alert {
        Alert {
            timestamp: Utc::now(),
            offender: offender.address,
            count: offender.count,
            claimed_ips: self.detector.claimed_ips(&offender.address),
            interface_index: frozen.interface_index,
            gateway: frozen.gateway,
            gateway_mac: frozen.gateway_mac,
        }
    }
}

fn freeze_gateway(
    locator: &GatewayLocator,
    table: &NeighborTable,
    adapter: &str,
    gateway_override: Option<Ipv4Addr>,
    suspect: MacAddr,
) -> Result<FrozenGateway> {
    let interface_index = locator.resolve_active_interface_index(adapter)?;
    if interface_index == UNRESOLVED_INDEX {
        return Err(Error::InterfaceUnresolved(adapter.to_string()));
    }

    let gateway = match gateway_override {
        Some(gateway) => gateway,
        None => locator
            .resolve_default_gateway()?
            .ok_or(Error::GatewayUnresolved)?,
    };

    let gateway_mac = table.freeze_gateway_entry(interface_index, gateway)?;
    if gateway_mac == suspect {
        warn!(
            %gateway, %gateway_mac,
            "gateway already resolved to the suspected sender; the frozen entry carries that address"
        );
    }

    Ok(FrozenGateway {
        interface_index,
        gateway,
        gateway_mac,
    })
}
