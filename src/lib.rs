pub mod auth;
#[cfg(feature = "ble")]
pub mod ble;
pub mod blocking;
pub mod buffer;
pub mod client;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod mac;
pub mod srp;

pub use auth::AuthTokens;
pub use client::EdilkaminClient;
pub use device::{Command, DeviceInfo, Power};
pub use error::{Error, Result};
pub use mac::{bluetooth_mac_to_wifi_mac, format_mac};
