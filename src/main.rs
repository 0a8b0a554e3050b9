use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arpguard::config::Args;
use arpguard::report::{self, AlertFormat};
use arpguard::{
    cli, sniff, ArpAnomalyDetector, Error, GatewayLocator, MitigationCoordinator, NeighborTable,
    Shutdown,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_filter().into()),
        )
        .init();

    let devices = match sniff::list_devices() {
        Ok(devices) => devices,
        Err(e @ Error::NoDevices) | Err(e @ Error::Capture(_)) => {
            error!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    cli::print_devices(&devices, args.details);
    let device = match &args.device {
        Some(choice) => cli::select_device(devices, choice)?,
        None => cli::prompt_device(devices)?,
    };
    let adapter = device.name.clone();
    let description = device.desc.clone().unwrap_or_else(|| adapter.clone());

    let table = NeighborTable::system().context("neighbor table unavailable")?;
    let mut cap = sniff::open_capture(device, &args.capture_settings())
        .with_context(|| format!("Failed to open capture on {}", adapter))?;

    let shutdown = Shutdown::new();
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        ctrlc_shutdown.trigger();
    })
    .context("Failed to install Ctrl-C handler")?;

    let detector = Arc::new(ArpAnomalyDetector::new(args.detector_settings()));
    let (tx, rx) = unbounded();
    let format = if args.json { AlertFormat::Json } else { AlertFormat::Text };
    let reporter = report::spawn_reporter(rx, format);

    let coordinator = MitigationCoordinator::new(
        Arc::clone(&detector),
        GatewayLocator::system(),
        table,
        args.mitigation_settings(&adapter),
        tx,
    );
    let mitigation = tokio::spawn(coordinator.run(shutdown.clone()));

    info!("Listening on {}...", description);
    let capture_shutdown = shutdown.clone();
    let capture = tokio::task::spawn_blocking(move || {
        sniff::run_capture(&mut cap, detector, &capture_shutdown)
    });

    match capture.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("Packet capture error: {}", e),
        Err(e) => error!("Capture thread failed: {}", e),
    }
    shutdown.trigger();

    let state = mitigation.await.context("mitigation task failed")?;
    info!(?state, "mitigation loop stopped");
    if reporter.join().is_err() {
        error!("alert reporter panicked");
    }
    Ok(())
}
