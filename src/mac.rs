//! MAC address helpers.
//!
//! The cloud API identifies a stove by its Wi-Fi MAC written as 12 lowercase
//! hex digits (`aabbccddeeff`). Stoves advertise over Bluetooth with an
//! address two above that.

use crate::error::{Error, Result};

/// Offset between the Bluetooth and the Wi-Fi MAC of a stove.
const BLUETOOTH_MAC_OFFSET: u64 = 2;

/// Normalize a MAC address to the identifier used by the API.
///
/// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
pub fn format_mac(mac: &str) -> Result<String> {
    let normalized: String = mac
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_lowercase();

    if normalized.len() != 12 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidMac(mac.to_string()));
    }

    Ok(normalized)
}

/// Insert colons into a normalized identifier: `aabbccddeeff` -> `aa:bb:cc:dd:ee:ff`.
pub fn colon_mac(normalized: &str) -> String {
    normalized
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Convert the Bluetooth address a stove advertises into its Wi-Fi MAC.
pub fn bluetooth_mac_to_wifi_mac(mac: &str) -> Result<String> {
    let normalized = format_mac(mac)?;
    let value =
        u64::from_str_radix(&normalized, 16).map_err(|_| Error::InvalidMac(mac.to_string()))?;
    let wifi = value
        .checked_sub(BLUETOOTH_MAC_OFFSET)
        .ok_or_else(|| Error::InvalidMac(mac.to_string()))?;

    Ok(colon_mac(&format!("{:012x}", wifi)))
}
