use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::auth::{AuthTokens, CognitoClient};
use crate::buffer::process_response;
use crate::device::{Command, DeviceInfo, MqttCommand, Power};
use crate::error::{Error, Result};
use crate::mac::format_mac;

pub const API_URL: &str = "https://the-mind-api.edilkamin.com/";
pub const LEGACY_API_URL: &str = "https://fxtj7xkgc6.execute-api.eu-central-1.amazonaws.com/prod/";

pub struct EdilkaminClient {
    client: reqwest::Client,
    cognito: CognitoClient,
    base_url: String,
    legacy: bool,
    access_token: Option<String>,
}

impl Default for EdilkaminClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EdilkaminClient {
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new(), API_URL.to_string(), false)
    }

    /// Client for the older AWS API Gateway backend.
    pub fn new_legacy() -> Self {
        Self::with_http_client(reqwest::Client::new(), LEGACY_API_URL.to_string(), true)
    }

    pub fn new_for_api(legacy: bool) -> Self {
        if legacy {
            Self::new_legacy()
        } else {
            Self::new()
        }
    }

    // Test-specific constructor for custom base URLs
    pub fn new_with_base_url(base_url: String) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, false)
    }

    pub fn with_http_client(client: reqwest::Client, base_url: String, legacy: bool) -> Self {
        Self {
            cognito: CognitoClient::with_http_client(
                client.clone(),
                format!("https://cognito-idp.{}.amazonaws.com/", crate::auth::REGION),
            ),
            client,
            base_url,
            legacy,
            access_token: None,
        }
    }

    pub fn with_cognito(mut self, cognito: CognitoClient) -> Self {
        self.cognito = cognito;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> &Option<String> {
        &self.access_token
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Full URL of an API path.
    pub fn get_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sign in and keep the bearer token matching this client's API.
    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<AuthTokens> {
        let tokens = self.cognito.sign_in(username, password).await?;
        self.access_token = Some(tokens.bearer(self.legacy).to_string());
        debug!("Authentication successful");
        Ok(tokens)
    }

    /// Refresh the session and keep the new bearer token.
    pub async fn refresh(&mut self, refresh_token: &str) -> Result<AuthTokens> {
        let tokens = self.cognito.refresh(refresh_token).await?;
        self.access_token = Some(tokens.bearer(self.legacy).to_string());
        Ok(tokens)
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.access_token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value).map_err(|e| Error::Auth(e.to_string()))?,
            );
        } else {
            return Err(Error::Auth(
                "Not authenticated. Call sign_in() first.".to_string(),
            ));
        }

        Ok(headers)
    }

    /// Fetch the device document, decompressing buffer sections.
    pub async fn device_info(&self, mac_address: &str) -> Result<DeviceInfo> {
        let mac = format_mac(mac_address)?;
        debug!("Fetching device info for: {}", mac);

        let url = self.get_endpoint(&format!("device/{}/info", mac));
        let headers = self.get_headers()?;

        let response = self.client.get(&url).headers(headers).send().await?;

        let status = response.status();
        let response_text = response.text().await?;
        if status.is_success() {
            match serde_json::from_str::<Value>(&response_text) {
                Ok(value) => Ok(DeviceInfo::new(process_response(value))),
                Err(e) => {
                    error!("Failed to parse device info: {}", e);
                    debug!("Raw response: {}", response_text);
                    Err(Error::Json(e))
                }
            }
        } else {
            error!("Failed to fetch device info: {}", response_text);
            Err(Error::Api {
                status,
                message: response_text,
            })
        }
    }

    /// Relay a command to the stove and return the backend's answer,
    /// e.g. "Command 0123456789abcdef executed successfully".
    pub async fn mqtt_command(&self, mac_address: &str, command: Command) -> Result<String> {
        let mac = format_mac(mac_address)?;
        let url = self.get_endpoint("mqtt/command");
        let headers = self.get_headers()?;

        debug!("Sending command to {}: {:?}", mac, command);

        let body = MqttCommand {
            mac_address: &mac,
            command: &command,
        };
        let response = self
            .client
            .put(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        if status.is_success() {
            debug!("Command {} sent to {}", command.name, mac);
            Ok(match serde_json::from_str::<Value>(&response_text) {
                Ok(Value::String(message)) => message,
                Ok(other) => other.to_string(),
                Err(_) => response_text,
            })
        } else {
            error!("Failed to send command to device: {}", response_text);
            Err(Error::Api {
                status,
                message: response_text,
            })
        }
    }

    pub async fn check_connection(&self, mac_address: &str) -> Result<String> {
        self.mqtt_command(mac_address, Command::check()).await
    }

    pub async fn set_power(&self, mac_address: &str, power: Power) -> Result<String> {
        self.mqtt_command(mac_address, Command::power(power)).await
    }

    pub async fn set_power_on(&self, mac_address: &str) -> Result<String> {
        debug!("Turning on device: {}", mac_address);
        self.set_power(mac_address, Power::On).await
    }

    pub async fn set_power_off(&self, mac_address: &str) -> Result<String> {
        debug!("Turning off device: {}", mac_address);
        self.set_power(mac_address, Power::Off).await
    }

    pub async fn get_power(&self, mac_address: &str) -> Result<Power> {
        self.device_info(mac_address).await?.power()
    }

    pub async fn get_environment_temperature(&self, mac_address: &str) -> Result<f64> {
        self.device_info(mac_address)
            .await?
            .environment_temperature()
    }

    pub async fn get_target_temperature(&self, mac_address: &str) -> Result<f64> {
        self.device_info(mac_address).await?.target_temperature()
    }

    pub async fn set_target_temperature(&self, mac_address: &str, celsius: f64) -> Result<String> {
        self.mqtt_command(mac_address, Command::target_temperature(celsius))
            .await
    }

    pub async fn get_alarm_reset(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.alarm_reset()
    }

    pub async fn reset_alarm(&self, mac_address: &str) -> Result<String> {
        self.mqtt_command(mac_address, Command::alarm_reset()).await
    }

    pub async fn get_perform_cochlea_loading(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address)
            .await?
            .perform_cochlea_loading()
    }

    pub async fn set_perform_cochlea_loading(&self, mac_address: &str, on: bool) -> Result<String> {
        self.mqtt_command(mac_address, Command::cochlea_loading(on))
            .await
    }

    pub async fn get_fan_speed(&self, mac_address: &str, fan_id: u8) -> Result<u64> {
        self.device_info(mac_address).await?.fan_speed(fan_id)
    }

    /// Set the speed of fan `fan_id`. Returns `None` without sending anything
    /// when the stove has fewer fans.
    pub async fn set_fan_speed(
        &self,
        mac_address: &str,
        fan_id: u8,
        speed: u8,
    ) -> Result<Option<String>> {
        if !self.device_info(mac_address).await?.has_fan(fan_id)? {
            return Ok(None);
        }
        self.mqtt_command(mac_address, Command::fan_speed(fan_id, speed))
            .await
            .map(Some)
    }

    pub async fn get_airkare(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.airkare()
    }

    pub async fn set_airkare(&self, mac_address: &str, on: bool) -> Result<String> {
        self.mqtt_command(mac_address, Command::airkare(on)).await
    }

    pub async fn get_relax_mode(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.relax_mode()
    }

    pub async fn set_relax_mode(&self, mac_address: &str, on: bool) -> Result<String> {
        self.mqtt_command(mac_address, Command::relax_mode(on)).await
    }

    pub async fn get_manual_power_level(&self, mac_address: &str) -> Result<u64> {
        self.device_info(mac_address).await?.manual_power_level()
    }

    pub async fn set_manual_power_level(&self, mac_address: &str, level: u8) -> Result<String> {
        self.mqtt_command(mac_address, Command::manual_power_level(level))
            .await
    }

    pub async fn get_standby_mode(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.standby_mode()
    }

    /// Toggle standby. Only available in auto mode; returns `None` without
    /// sending anything otherwise.
    pub async fn set_standby_mode(&self, mac_address: &str, on: bool) -> Result<Option<String>> {
        if !self.device_info(mac_address).await?.is_auto()? {
            warn!("Standby mode is only available from auto mode.");
            return Ok(None);
        }
        self.mqtt_command(mac_address, Command::standby_mode(on))
            .await
            .map(Some)
    }

    pub async fn get_chrono_mode(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.chrono_mode()
    }

    pub async fn set_chrono_mode(&self, mac_address: &str, on: bool) -> Result<String> {
        self.mqtt_command(mac_address, Command::chrono_mode(on)).await
    }

    pub async fn get_easy_timer(&self, mac_address: &str) -> Result<u64> {
        self.device_info(mac_address).await?.easy_timer()
    }

    pub async fn set_easy_timer(&self, mac_address: &str, on: bool) -> Result<String> {
        self.mqtt_command(mac_address, Command::easy_timer(on)).await
    }

    pub async fn get_autonomy_time(&self, mac_address: &str) -> Result<u64> {
        self.device_info(mac_address).await?.autonomy_time()
    }

    pub async fn get_pellet_reserve(&self, mac_address: &str) -> Result<bool> {
        self.device_info(mac_address).await?.pellet_reserve()
    }

    pub async fn get_serial_number(&self, mac_address: &str) -> Result<String> {
        self.device_info(mac_address).await?.serial_number()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EdilkaminClient::new();
        assert_eq!(client.base_url(), "https://the-mind-api.edilkamin.com/");
        assert!(!client.is_legacy());
        assert!(client.access_token().is_none());

        let legacy = EdilkaminClient::new_legacy();
        assert_eq!(legacy.base_url(), LEGACY_API_URL);
        assert!(legacy.is_legacy());
        assert!(EdilkaminClient::new_for_api(true).is_legacy());
    }

    #[test]
    fn test_get_endpoint() {
        let client = EdilkaminClient::new_legacy();
        assert_eq!(
            client.get_endpoint("device/aabbccddeeff/info"),
            "https://fxtj7xkgc6.execute-api.eu-central-1.amazonaws.com/prod/device/aabbccddeeff/info"
        );

        let custom = EdilkaminClient::new_with_base_url("http://127.0.0.1:1234".to_string());
        assert_eq!(
            custom.get_endpoint("mqtt/command"),
            "http://127.0.0.1:1234/mqtt/command"
        );
    }

    #[test]
    fn test_headers_require_token() {
        let client = EdilkaminClient::new();
        assert!(matches!(client.get_headers(), Err(Error::Auth(_))));

        let client = client.with_token("token");
        let headers = client.get_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer token");
    }
}
