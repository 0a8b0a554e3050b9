//! Command-line and environment configuration.

use std::net::Ipv4Addr;
use std::time::Duration;

use clap::Parser;

use crate::detection::{DetectorSettings, DEFAULT_THRESHOLD};
use crate::mitigation::MitigationSettings;
use crate::sniff::CaptureSettings;

/// Watch ARP traffic for cache-poisoning floods and freeze the gateway's
/// neighbor entry when one is seen.
#[derive(Parser, Debug, Clone)]
#[command(name = "arpguard")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Print full device details in the device list
    #[arg(short = 'd', long = "details")]
    pub details: bool,

    /// Capture device, by name or 1-based position in the list (skips the prompt)
    #[arg(long, env = "ARPGUARD_DEVICE")]
    pub device: Option<String>,

    /// Frames from one hardware address beyond which the sender is suspicious
    #[arg(long, env = "ARPGUARD_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u64,

    /// Restart each sender's count after this many seconds (unset: never)
    #[arg(long, env = "ARPGUARD_WINDOW_SECS")]
    pub window_secs: Option<u64>,

    /// How often the mitigation loop checks the detector
    #[arg(long, env = "ARPGUARD_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Minimum delay before retrying a failed mitigation
    #[arg(long, env = "ARPGUARD_RETRY_BACKOFF_MS", default_value_t = 5000)]
    pub retry_backoff_ms: u64,

    /// Read timeout handed to the capture driver
    #[arg(long, env = "ARPGUARD_CAPTURE_TIMEOUT_MS", default_value_t = 1000)]
    pub capture_timeout_ms: i32,

    /// Maximum bytes captured per frame
    #[arg(long, env = "ARPGUARD_SNAPLEN", default_value_t = 65536)]
    pub snaplen: i32,

    /// Only capture frames addressed to this host
    #[arg(long = "no-promisc")]
    pub no_promisc: bool,

    /// Gateway to freeze instead of the discovered one
    #[arg(long, env = "ARPGUARD_GATEWAY")]
    pub gateway: Option<Ipv4Addr>,

    /// Print alerts as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (default info, -v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Parses the command line after loading `.env`, so `ARPGUARD_*` entries
    /// from the file act as defaults.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            threshold: self.threshold,
            window: self.window_secs.map(Duration::from_secs),
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            snaplen: self.snaplen,
            timeout_ms: self.capture_timeout_ms,
            promiscuous: !self.no_promisc,
        }
    }

    pub fn mitigation_settings(&self, adapter: &str) -> MitigationSettings {
        MitigationSettings {
            adapter: adapter.to_string(),
            gateway_override: self.gateway,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let args = Args::try_parse_from(["arpguard"]).unwrap();
        assert_eq!(args.threshold, 20);
        assert_eq!(args.poll_interval_ms, 100);
        assert_eq!(args.capture_timeout_ms, 1000);
        assert_eq!(args.snaplen, 65536);
        assert!(!args.no_promisc);
        assert_eq!(args.detector_settings().window, None);
        assert!(args.capture_settings().promiscuous);
    }

    #[test]
    fn overrides_flow_into_settings() {
        let args = Args::try_parse_from([
            "arpguard",
            "-d",
            "--threshold",
            "5",
            "--window-secs",
            "60",
            "--gateway",
            "10.0.0.1",
            "--no-promisc",
            "-vv",
        ])
        .unwrap();
        assert!(args.details);
        assert_eq!(args.detector_settings().threshold, 5);
        assert_eq!(args.detector_settings().window, Some(Duration::from_secs(60)));
        assert!(!args.capture_settings().promiscuous);
        assert_eq!(args.log_filter(), "trace");

        let mitigation = args.mitigation_settings("eth0");
        assert_eq!(mitigation.gateway_override, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(mitigation.adapter, "eth0");
    }

    #[test]
    fn verbosity_maps_to_log_levels() {
        let level = |argv: &[&str]| Args::try_parse_from(argv).unwrap().log_filter();
        assert_eq!(level(&["arpguard"]), "info");
        assert_eq!(level(&["arpguard", "-v"]), "debug");
        assert_eq!(level(&["arpguard", "-vv"]), "trace");
        assert_eq!(level(&["arpguard", "-vvvv"]), "trace");
    }
}
