//! Blocking flavour of [`crate::EdilkaminClient`].
//!
//! Each method forwards to the async client through [`crate::dispatch::block_on`],
//! so it can be called from plain `main` functions as well as from inside an
//! async context.

use crate::auth::{AuthTokens, CognitoClient};
use crate::client::{self, API_URL, LEGACY_API_URL};
use crate::device::{Command, DeviceInfo, Power};
use crate::dispatch::block_on;
use crate::error::Result;

pub struct EdilkaminClient {
    inner: client::EdilkaminClient,
}

// Every call runs on a fresh runtime, so pooled connections would be bound
// to a runtime that no longer exists.
fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()?)
}

impl EdilkaminClient {
    pub fn new() -> Result<Self> {
        Self::build(API_URL.to_string(), false)
    }

    pub fn new_legacy() -> Result<Self> {
        Self::build(LEGACY_API_URL.to_string(), true)
    }

    pub fn new_with_base_url(base_url: String) -> Result<Self> {
        Self::build(base_url, false)
    }

    fn build(base_url: String, legacy: bool) -> Result<Self> {
        Ok(Self {
            inner: client::EdilkaminClient::with_http_client(http_client()?, base_url, legacy),
        })
    }

    pub fn with_cognito_endpoint(mut self, endpoint: String) -> Result<Self> {
        let cognito = CognitoClient::with_http_client(http_client()?, endpoint);
        self.inner = self.inner.with_cognito(cognito);
        Ok(self)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_token(token);
        self
    }

    pub fn access_token(&self) -> &Option<String> {
        self.inner.access_token()
    }

    pub fn sign_in(&mut self, username: &str, password: &str) -> Result<AuthTokens> {
        block_on(self.inner.sign_in(username, password))
    }

    pub fn refresh(&mut self, refresh_token: &str) -> Result<AuthTokens> {
        block_on(self.inner.refresh(refresh_token))
    }

    pub fn device_info(&self, mac_address: &str) -> Result<DeviceInfo> {
        block_on(self.inner.device_info(mac_address))
    }

    pub fn mqtt_command(&self, mac_address: &str, command: Command) -> Result<String> {
        block_on(self.inner.mqtt_command(mac_address, command))
    }

    pub fn check_connection(&self, mac_address: &str) -> Result<String> {
        block_on(self.inner.check_connection(mac_address))
    }

    pub fn set_power(&self, mac_address: &str, power: Power) -> Result<String> {
        block_on(self.inner.set_power(mac_address, power))
    }

    pub fn set_power_on(&self, mac_address: &str) -> Result<String> {
        block_on(self.inner.set_power_on(mac_address))
    }

    pub fn set_power_off(&self, mac_address: &str) -> Result<String> {
        block_on(self.inner.set_power_off(mac_address))
    }

    pub fn get_power(&self, mac_address: &str) -> Result<Power> {
        block_on(self.inner.get_power(mac_address))
    }

    pub fn get_environment_temperature(&self, mac_address: &str) -> Result<f64> {
        block_on(self.inner.get_environment_temperature(mac_address))
    }

    pub fn get_target_temperature(&self, mac_address: &str) -> Result<f64> {
        block_on(self.inner.get_target_temperature(mac_address))
    }

    pub fn set_target_temperature(&self, mac_address: &str, celsius: f64) -> Result<String> {
        block_on(self.inner.set_target_temperature(mac_address, celsius))
    }

    pub fn get_alarm_reset(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_alarm_reset(mac_address))
    }

    pub fn reset_alarm(&self, mac_address: &str) -> Result<String> {
        block_on(self.inner.reset_alarm(mac_address))
    }

    pub fn get_perform_cochlea_loading(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_perform_cochlea_loading(mac_address))
    }

    pub fn set_perform_cochlea_loading(&self, mac_address: &str, on: bool) -> Result<String> {
        block_on(self.inner.set_perform_cochlea_loading(mac_address, on))
    }

    pub fn get_fan_speed(&self, mac_address: &str, fan_id: u8) -> Result<u64> {
        block_on(self.inner.get_fan_speed(mac_address, fan_id))
    }

    pub fn set_fan_speed(&self, mac_address: &str, fan_id: u8, speed: u8) -> Result<Option<String>> {
        block_on(self.inner.set_fan_speed(mac_address, fan_id, speed))
    }

    pub fn get_airkare(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_airkare(mac_address))
    }

    pub fn set_airkare(&self, mac_address: &str, on: bool) -> Result<String> {
        block_on(self.inner.set_airkare(mac_address, on))
    }

    pub fn get_relax_mode(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_relax_mode(mac_address))
    }

    pub fn set_relax_mode(&self, mac_address: &str, on: bool) -> Result<String> {
        block_on(self.inner.set_relax_mode(mac_address, on))
    }

    pub fn get_manual_power_level(&self, mac_address: &str) -> Result<u64> {
        block_on(self.inner.get_manual_power_level(mac_address))
    }

    pub fn set_manual_power_level(&self, mac_address: &str, level: u8) -> Result<String> {
        block_on(self.inner.set_manual_power_level(mac_address, level))
    }

    pub fn get_standby_mode(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_standby_mode(mac_address))
    }

    pub fn set_standby_mode(&self, mac_address: &str, on: bool) -> Result<Option<String>> {
        block_on(self.inner.set_standby_mode(mac_address, on))
    }

    pub fn get_chrono_mode(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_chrono_mode(mac_address))
    }

    pub fn set_chrono_mode(&self, mac_address: &str, on: bool) -> Result<String> {
        block_on(self.inner.set_chrono_mode(mac_address, on))
    }

    pub fn get_easy_timer(&self, mac_address: &str) -> Result<u64> {
        block_on(self.inner.get_easy_timer(mac_address))
    }

    pub fn set_easy_timer(&self, mac_address: &str, on: bool) -> Result<String> {
        block_on(self.inner.set_easy_timer(mac_address, on))
    }

    pub fn get_autonomy_time(&self, mac_address: &str) -> Result<u64> {
        block_on(self.inner.get_autonomy_time(mac_address))
    }

    pub fn get_pellet_reserve(&self, mac_address: &str) -> Result<bool> {
        block_on(self.inner.get_pellet_reserve(mac_address))
    }

    pub fn get_serial_number(&self, mac_address: &str) -> Result<String> {
        block_on(self.inner.get_serial_number(mac_address))
    }
}
