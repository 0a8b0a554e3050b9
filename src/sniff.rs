// src/sniff.rs
use pcap::{Active, Capture, Device};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::detection::ArpAnomalyDetector;
use crate::error::{Error, Result};
use crate::parser;
use crate::shutdown::Shutdown;

const ARP_FILTER: &str = "arp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub snaplen: i32,
    pub timeout_ms: i32,
    pub promiscuous: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            snaplen: 65536,
            timeout_ms: 1000,
            promiscuous: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames: u64,
    pub observed: u64,
    pub skipped: u64,
}

pub fn list_devices() -> Result<Vec<Device>> {
    let devices = Device::list()?;
    if devices.is_empty() {
        return Err(Error::NoDevices);
    }
    Ok(devices)
}

pub fn open_capture(device: Device, settings: &CaptureSettings) -> Result<Capture<Active>> {
    let mut cap = Capture::from_device(device)?
        .promisc(settings.promiscuous)
        .snaplen(settings.snaplen)
        .timeout(settings.timeout_ms)
        .immediate_mode(true)
        .open()?;
    cap.filter(ARP_FILTER, true)?;
    Ok(cap)
}

/// Feeds every ARP frame to the detector until shutdown or the handle closes.
/// Runs on its own thread; never touches the neighbor table.
pub fn run_capture(
    cap: &mut Capture<Active>,
    detector: Arc<ArpAnomalyDetector>,
    shutdown: &Shutdown,
) -> Result<CaptureSummary> {
    let mut summary = CaptureSummary::default();

    while !shutdown.is_triggered() {
        match cap.next_packet() {
            Ok(packet) => {
                summary.frames += 1;
                if handle_frame(packet.data, &detector) {
                    summary.observed += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            // read timeout expired with nothing on the wire
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => {
                debug!("capture handle closed");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        frames = summary.frames,
        observed = summary.observed,
        skipped = summary.skipped,
        "capture finished"
    );
    Ok(summary)
}

/// Returns false for frames that carry no usable ARP sender.
pub fn handle_frame(data: &[u8], detector: &ArpAnomalyDetector) -> bool {
    match parser::parse_arp_frame(data) {
        Some(record) => {
            detector.observe(record);
            true
        }
        None => {
            trace!(len = data.len(), "skipping malformed frame");
            false
        }
    }
}
