//! Discovery of nearby stoves over Bluetooth Low Energy.
//!
//! Stoves advertise themselves as `EDILKAMIN_EP`. Their radio address is not
//! the identifier the cloud API expects, see [`bluetooth_mac_to_wifi_mac`].

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::error::Result;
use crate::mac::bluetooth_mac_to_wifi_mac;

/// Advertised local name of Edilkamin stoves.
pub const DEVICE_NAME: &str = "EDILKAMIN_EP";

pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: Option<String>,
    pub address: String,
}

/// Keep the stoves among `devices` and return their addresses, converted to
/// Wi-Fi MACs when `convert` is set. Addresses that cannot be converted are
/// skipped.
pub fn discover_devices_helper(devices: &[DiscoveredDevice], convert: bool) -> Vec<String> {
    devices
        .iter()
        .filter(|device| device.name.as_deref() == Some(DEVICE_NAME))
        .filter_map(|device| {
            if !convert {
                return Some(device.address.clone());
            }
            match bluetooth_mac_to_wifi_mac(&device.address) {
                Ok(mac) => Some(mac),
                Err(e) => {
                    warn!("Skipping stove at {}: {}", device.address, e);
                    None
                }
            }
        })
        .collect()
}

/// Scan with one adapter for `duration` and list what was seen.
pub async fn scan_adapter(adapter: &Adapter, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(duration).await;
    adapter.stop_scan().await?;

    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await? {
        match peripheral.properties().await {
            Ok(Some(properties)) => devices.push(DiscoveredDevice {
                name: properties.local_name,
                address: properties.address.to_string(),
            }),
            Ok(None) => {}
            Err(e) => debug!("Error reading peripheral properties: {}", e),
        }
    }
    Ok(devices)
}

/// Scan every adapter and return the addresses of the stoves found.
pub async fn discover_devices(convert: bool, duration: Duration) -> Result<Vec<String>> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    let mut devices = Vec::new();
    for adapter in &adapters {
        info!("Scanning for {} ms...", duration.as_millis());
        devices.extend(scan_adapter(adapter, duration).await?);
    }

    let stoves = discover_devices_helper(&devices, convert);
    info!("Scan complete. Found {} stove(s)", stoves.len());
    Ok(stoves)
}
