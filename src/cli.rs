//! Device listing and selection on the console.

use std::io::{self, BufRead, Write};

use pcap::Device;

use crate::error::{Error, Result};

pub fn print_devices(devices: &[Device], details: bool) {
    println!("\nInterface Device List:");
    for (i, device) in devices.iter().enumerate() {
        let addrs: Vec<String> = device.addresses.iter().map(|a| a.addr.to_string()).collect();
        print!("{}. {}  {}", i + 1, device.name, addrs.join(", "));
        if details {
            print_device_details(device);
        }
        match &device.desc {
            Some(desc) => println!(" ({})", desc),
            None => println!(" (No description available)"),
        }
    }
}

fn print_device_details(device: &Device) {
    println!();
    println!("{}", device.name);
    println!(
        "\tDescription: {}",
        device.desc.as_deref().unwrap_or("NONE AVAILABLE")
    );
    println!(
        "\tLoopback: {}",
        if device.flags.is_loopback() { "yes" } else { "no" }
    );
    for address in &device.addresses {
        println!("\tAddress: {}", address.addr);
        if let Some(netmask) = address.netmask {
            println!("\tNetmask: {}", netmask);
        }
        if let Some(broadcast) = address.broadcast_addr {
            println!("\tBroadcast Address: {}", broadcast);
        }
        if let Some(dst) = address.dst_addr {
            println!("\tDestination Address: {}", dst);
        }
    }
}

/// Resolves a 1-based position or an exact device name.
pub fn select_index(names: &[&str], choice: &str) -> Option<usize> {
    let choice = choice.trim();
    if let Ok(n) = choice.parse::<usize>() {
        return (1..=names.len()).contains(&n).then(|| n - 1);
    }
    names.iter().position(|name| *name == choice)
}

pub fn select_device(devices: Vec<Device>, choice: &str) -> Result<Device> {
    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    let index = select_index(&names, choice)
        .ok_or_else(|| Error::InvalidSelection(choice.to_string()))?;
    devices
        .into_iter()
        .nth(index)
        .ok_or_else(|| Error::InvalidSelection(choice.to_string()))
}

/// Asks on standard input until a valid number is entered.
pub fn prompt_device(devices: Vec<Device>) -> Result<Device> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        println!("Enter the interface number (1-{}):", devices.len());
        io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => return Err(Error::InvalidSelection("standard input closed".to_string())),
        };
        // numbers only here; names are accepted through --device
        if line.trim().parse::<usize>().is_ok() {
            if let Ok(device) = select_device(devices.clone(), &line) {
                return Ok(device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 3] = ["eth0", "wlan0", "any"];

    #[test]
    fn selects_by_one_based_position() {
        assert_eq!(select_index(&NAMES, "1"), Some(0));
        assert_eq!(select_index(&NAMES, " 3\n"), Some(2));
    }

    #[test]
    fn rejects_out_of_range_positions() {
        assert_eq!(select_index(&NAMES, "0"), None);
        assert_eq!(select_index(&NAMES, "4"), None);
        assert_eq!(select_index(&NAMES, "-1"), None);
    }

    #[test]
    fn selects_by_name() {
        assert_eq!(select_index(&NAMES, "wlan0"), Some(1));
        assert_eq!(select_index(&NAMES, "wlan1"), None);
    }
}
