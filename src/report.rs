use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::error;

use crate::models::dto::Alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFormat {
    Text,
    Json,
}

pub fn render(alert: &Alert, format: AlertFormat) -> String {
    match format {
        AlertFormat::Text => format!("\n{}\n", alert),
        AlertFormat::Json => serde_json::to_string(alert).unwrap_or_else(|e| {
            error!("Failed to serialize alert: {}", e);
            alert.to_string()
        }),
    }
}

/// Prints alerts until every sender is dropped. Returns how many were printed.
pub fn spawn_reporter(rx: Receiver<Alert>, format: AlertFormat) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut printed = 0;
        for alert in rx {
            println!("{}", render(&alert, format));
            printed += 1;
        }
        printed
    })
}
