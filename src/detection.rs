use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use multimap::MultiMap;
use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::models::domain::{HardwareAddressStat, MacAddr, ObservationRecord};

/// Announcements from one sender beyond which the stream is suspicious.
pub const DEFAULT_THRESHOLD: u64 = 20;

/// Distinct sender IPs remembered per hardware address. Further claims are
/// still counted but not stored.
pub const MAX_CLAIMS_PER_SENDER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSettings {
    pub threshold: u64,
    /// When set, a sender's count restarts once this much time has passed since
    /// its window opened. `None` keeps lifetime counters.
    pub window: Option<Duration>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    count: u64,
    window_start: Instant,
}

#[derive(Default)]
struct Counters {
    entries: HashMap<MacAddr, Entry>,
    claims: MultiMap<MacAddr, Ipv4Addr>,
    first_offender: Option<MacAddr>,
}

/// Per-sender ARP frequency counter.
///
/// `observe` runs on the capture thread while the coordinator queries from its
/// own task; every access goes through one short critical section so readers
/// always see a consistent view of all entries.
pub struct ArpAnomalyDetector {
    settings: DetectorSettings,
    counters: Mutex<Counters>,
    crossed: Notify,
}

impl ArpAnomalyDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            counters: Mutex::new(Counters::default()),
            crossed: Notify::new(),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.settings.threshold
    }

    pub fn observe(&self, record: ObservationRecord) {
        self.observe_at(record, Instant::now());
    }

    pub(crate) fn observe_at(&self, record: ObservationRecord, now: Instant) {
        let ObservationRecord { sender_mac, sender_ip } = record;
        let threshold = self.settings.threshold;

        let crossed = {
            let mut guard = self.counters.lock();
            let Counters {
                entries,
                claims,
                first_offender,
            } = &mut *guard;

            let entry = entries.entry(sender_mac).or_insert_with(|| {
                debug!(mac = %sender_mac, ip = %sender_ip, "New address");
                Entry {
                    count: 0,
                    window_start: now,
                }
            });
            if let Some(window) = self.settings.window {
                if now.saturating_duration_since(entry.window_start) >= window {
                    entry.count = 0;
                    entry.window_start = now;
                }
            }
            entry.count += 1;
            let count = entry.count;

            let room = claims.get_vec(&sender_mac).map_or(true, |ips| {
                ips.len() < MAX_CLAIMS_PER_SENDER && !ips.contains(&sender_ip)
            });
            if room {
                claims.insert(sender_mac, sender_ip);
            }

            let crossed = threshold.checked_add(1) == Some(count);
            if crossed {
                let current_still_over = first_offender
                    .and_then(|mac| entries.get(&mac))
                    .map_or(false, |e| self.live_count(e, now) > threshold);
                if !current_still_over {
                    *first_offender = Some(sender_mac);
                }
            }
            crossed
        };

        if crossed {
            info!(mac = %sender_mac, threshold, "sender crossed announcement threshold");
            self.crossed.notify_one();
        }
    }

    /// True iff some sender's count strictly exceeds the threshold.
    pub fn is_suspicious(&self) -> bool {
        let now = Instant::now();
        let counters = self.counters.lock();
        counters
            .entries
            .values()
            .any(|e| self.live_count(e, now) > self.settings.threshold)
    }

    /// The sender that first crossed the threshold, while it still exceeds it;
    /// otherwise the first exceeding entry in iteration order.
    pub fn most_suspicious_address(&self) -> Option<HardwareAddressStat> {
        let now = Instant::now();
        let threshold = self.settings.threshold;
        let counters = self.counters.lock();

        let first = counters.first_offender.and_then(|mac| {
            let count = self.live_count(counters.entries.get(&mac)?, now);
            (count > threshold).then_some(HardwareAddressStat { address: mac, count })
        });

        first.or_else(|| {
            counters.entries.iter().find_map(|(mac, e)| {
                let count = self.live_count(e, now);
                (count > threshold).then_some(HardwareAddressStat {
                    address: *mac,
                    count,
                })
            })
        })
    }

    pub fn count_for(&self, mac: &MacAddr) -> u64 {
        let now = Instant::now();
        self.counters
            .lock()
            .entries
            .get(mac)
            .map_or(0, |e| self.live_count(e, now))
    }

    pub fn claimed_ips(&self, mac: &MacAddr) -> Vec<Ipv4Addr> {
        self.counters
            .lock()
            .claims
            .get_vec(mac)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Vec<HardwareAddressStat> {
        let now = Instant::now();
        self.counters
            .lock()
            .entries
            .iter()
            .map(|(mac, e)| HardwareAddressStat {
                address: *mac,
                count: self.live_count(e, now),
            })
            .collect()
    }

    pub fn distinct_senders(&self) -> usize {
        self.counters.lock().entries.len()
    }

    /// Completes after a sender crosses the threshold. A crossing that happens
    /// while nobody is waiting is remembered for the next waiter.
    pub fn threshold_crossed(&self) -> Notified<'_> {
        self.crossed.notified()
    }

    fn live_count(&self, entry: &Entry, now: Instant) -> u64 {
        match self.settings.window {
            Some(window) if now.saturating_duration_since(entry.window_start) >= window => 0,
            _ => entry.count,
        }
    }
}

impl Default for ArpAnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorSettings::default())
    }
}
