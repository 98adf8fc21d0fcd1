use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Off = 0,
    On = 1,
}

impl Power {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Power::On),
            Value::Bool(false) => Some(Power::Off),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Some(Power::Off),
                Some(1) => Some(Power::On),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on {
            Power::On
        } else {
            Power::Off
        }
    }
}

impl std::fmt::Display for Power {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Power::On => write!(f, "On"),
            Power::Off => write!(f, "Off"),
        }
    }
}

/// A named parameter write, relayed to the stove by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub name: String,
    pub value: Value,
}

/// Body of `PUT mqtt/command`.
#[derive(Debug, Serialize)]
pub struct MqttCommand<'a> {
    pub mac_address: &'a str,
    #[serde(flatten)]
    pub command: &'a Command,
}

fn flag(on: bool) -> Value {
    Value::from(u8::from(on))
}

impl Command {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Connectivity probe; the backend answers once the stove acknowledges.
    pub fn check() -> Self {
        Self::new("check", "check")
    }

    pub fn power(power: Power) -> Self {
        Self::new("power", power as u8)
    }

    pub fn target_temperature(celsius: f64) -> Self {
        Self::new("enviroment_1_temperature", celsius)
    }

    pub fn alarm_reset() -> Self {
        Self::new("alarm_reset", 1)
    }

    pub fn cochlea_loading(on: bool) -> Self {
        Self::new("cochlea_loading", flag(on))
    }

    pub fn fan_speed(fan_id: u8, speed: u8) -> Self {
        Self::new(format!("fan_{}_speed", fan_id), speed)
    }

    pub fn airkare(on: bool) -> Self {
        Self::new("airkare_function", flag(on))
    }

    pub fn relax_mode(on: bool) -> Self {
        Self::new("relax_mode", flag(on))
    }

    pub fn manual_power_level(level: u8) -> Self {
        Self::new("power_level", level)
    }

    pub fn standby_mode(on: bool) -> Self {
        Self::new("standby_mode", flag(on))
    }

    pub fn chrono_mode(on: bool) -> Self {
        Self::new("chrono_mode", flag(on))
    }

    pub fn easy_timer(on: bool) -> Self {
        Self::new("easytimer", flag(on))
    }
}

/// Device document returned by `device/{mac}/info`, with buffer envelopes
/// already decompressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo(pub Value);

impl DeviceInfo {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn field(&self, pointer: &str) -> Result<&Value> {
        self.0
            .pointer(pointer)
            .ok_or_else(|| Error::MissingField(pointer.to_string()))
    }

    fn bool_field(&self, pointer: &str) -> Result<bool> {
        match self.field(pointer)? {
            Value::Bool(b) => Ok(*b),
            // Older firmware reports flags as 0/1.
            Value::Number(n) if n.as_u64().is_some() => Ok(n.as_u64() != Some(0)),
            _ => Err(Error::InvalidField(pointer.to_string())),
        }
    }

    fn f64_field(&self, pointer: &str) -> Result<f64> {
        self.field(pointer)?
            .as_f64()
            .ok_or_else(|| Error::InvalidField(pointer.to_string()))
    }

    fn u64_field(&self, pointer: &str) -> Result<u64> {
        self.field(pointer)?
            .as_u64()
            .ok_or_else(|| Error::InvalidField(pointer.to_string()))
    }

    pub fn power(&self) -> Result<Power> {
        let pointer = "/status/commands/power";
        Power::from_value(self.field(pointer)?)
            .ok_or_else(|| Error::InvalidField(pointer.to_string()))
    }

    pub fn environment_temperature(&self) -> Result<f64> {
        self.f64_field("/status/temperatures/enviroment")
    }

    pub fn target_temperature(&self) -> Result<f64> {
        self.f64_field("/nvm/user_parameters/enviroment_1_temperature")
    }

    pub fn alarm_reset(&self) -> Result<bool> {
        self.bool_field("/status/commands/alarm_reset")
    }

    pub fn perform_cochlea_loading(&self) -> Result<bool> {
        self.bool_field("/status/commands/perform_cochlea_loading")
    }

    pub fn fans_number(&self) -> Result<u64> {
        self.u64_field("/nvm/installer_parameters/fans_number")
    }

    /// Whether `fan_id` is installed, warning when it is not.
    pub fn has_fan(&self, fan_id: u8) -> Result<bool> {
        let fans_number = self.fans_number()?;
        if u64::from(fan_id) > fans_number {
            warn!("Only {} fan(s) available.", fans_number);
            return Ok(false);
        }
        Ok(true)
    }

    /// Speed of fan `fan_id` (1-based); `0` for a fan the stove does not have.
    pub fn fan_speed(&self, fan_id: u8) -> Result<u64> {
        if !self.has_fan(fan_id)? {
            return Ok(0);
        }
        self.u64_field(&format!("/status/fans/fan_{}_speed", fan_id))
    }

    pub fn airkare(&self) -> Result<bool> {
        self.bool_field("/status/flags/is_airkare_active")
    }

    pub fn relax_mode(&self) -> Result<bool> {
        self.bool_field("/status/flags/is_relax_active")
    }

    pub fn manual_power_level(&self) -> Result<u64> {
        self.u64_field("/nvm/user_parameters/manual_power")
    }

    pub fn standby_mode(&self) -> Result<bool> {
        self.bool_field("/nvm/user_parameters/is_standby_active")
    }

    pub fn is_auto(&self) -> Result<bool> {
        self.bool_field("/nvm/user_parameters/is_auto")
    }

    pub fn chrono_mode(&self) -> Result<bool> {
        self.bool_field("/status/flags/is_crono_active")
    }

    /// Remaining easy timer time, `0` when the timer is not running.
    pub fn easy_timer(&self) -> Result<u64> {
        if !self.bool_field("/status/flags/is_easytimer_active")? {
            return Ok(0);
        }
        self.u64_field("/status/easytimer/time")
    }

    pub fn autonomy_time(&self) -> Result<u64> {
        self.u64_field("/status/pellet/autonomy_time")
    }

    pub fn pellet_reserve(&self) -> Result<bool> {
        self.bool_field("/status/flags/is_pellet_in_reserve")
    }

    pub fn serial_number(&self) -> Result<String> {
        let pointer = "/component_info/motherboard/serial_number";
        self.field(pointer)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidField(pointer.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_power_parsing() {
        let on = DeviceInfo::new(json!({"status": {"commands": {"power": true}}}));
        assert_eq!(on.power().unwrap(), Power::On);

        let off = DeviceInfo::new(json!({"status": {"commands": {"power": false}}}));
        assert_eq!(off.power().unwrap(), Power::Off);

        let numeric = DeviceInfo::new(json!({"status": {"commands": {"power": 1}}}));
        assert_eq!(numeric.power().unwrap(), Power::On);

        let bogus = DeviceInfo::new(json!({"status": {"commands": {"power": 7}}}));
        assert!(matches!(bogus.power(), Err(Error::InvalidField(_))));
    }

    #[test]
    fn test_missing_field_reports_path() {
        let info = DeviceInfo::new(json!({}));
        match info.environment_temperature() {
            Err(Error::MissingField(path)) => {
                assert_eq!(path, "/status/temperatures/enviroment")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_is_not_reported_as_missing() {
        let info = DeviceInfo::new(json!({
            "status": {
                "temperatures": {"enviroment": "warm"},
                "flags": {"is_relax_active": "yes"}
            },
            "nvm": {"user_parameters": {"manual_power": -1}},
            "component_info": {"motherboard": {"serial_number": 42}}
        }));
        assert!(matches!(
            info.environment_temperature(),
            Err(Error::InvalidField(path)) if path == "/status/temperatures/enviroment"
        ));
        assert!(matches!(info.relax_mode(), Err(Error::InvalidField(_))));
        assert!(matches!(info.manual_power_level(), Err(Error::InvalidField(_))));
        assert!(matches!(info.serial_number(), Err(Error::InvalidField(_))));
        assert!(matches!(info.airkare(), Err(Error::MissingField(_))));
    }

    #[test]
    fn test_temperatures() {
        let info = DeviceInfo::new(json!({
            "status": {"temperatures": {"enviroment": 16.7}},
            "nvm": {"user_parameters": {"enviroment_1_temperature": 17.8}}
        }));
        assert_eq!(info.environment_temperature().unwrap(), 16.7);
        assert_eq!(info.target_temperature().unwrap(), 17.8);
    }

    #[test]
    fn test_fan_speed_respects_fans_number() {
        let two_fans = DeviceInfo::new(json!({
            "status": {"fans": {"fan_2_speed": 3}},
            "nvm": {"installer_parameters": {"fans_number": 2}}
        }));
        assert_eq!(two_fans.fan_speed(2).unwrap(), 3);

        let one_fan = DeviceInfo::new(json!({
            "status": {"fans": {"fan_2_speed": 3}},
            "nvm": {"installer_parameters": {"fans_number": 1}}
        }));
        assert_eq!(one_fan.fan_speed(2).unwrap(), 0);
        assert!(!one_fan.has_fan(2).unwrap());
    }

    #[test]
    fn test_easy_timer() {
        let inactive = DeviceInfo::new(json!({
            "status": {"flags": {"is_easytimer_active": false}, "easytimer": {"time": 1234}}
        }));
        assert_eq!(inactive.easy_timer().unwrap(), 0);

        let active = DeviceInfo::new(json!({
            "status": {"flags": {"is_easytimer_active": true}, "easytimer": {"time": 1234}}
        }));
        assert_eq!(active.easy_timer().unwrap(), 1234);
    }

    #[test]
    fn test_flags() {
        let info = DeviceInfo::new(json!({
            "status": {
                "commands": {"alarm_reset": false, "perform_cochlea_loading": true},
                "flags": {
                    "is_airkare_active": false,
                    "is_relax_active": true,
                    "is_crono_active": false,
                    "is_pellet_in_reserve": 1
                },
                "pellet": {"autonomy_time": 2100}
            },
            "nvm": {"user_parameters": {"manual_power": 3, "is_standby_active": false, "is_auto": true}}
        }));
        assert!(!info.alarm_reset().unwrap());
        assert!(info.perform_cochlea_loading().unwrap());
        assert!(!info.airkare().unwrap());
        assert!(info.relax_mode().unwrap());
        assert!(!info.chrono_mode().unwrap());
        assert!(info.pellet_reserve().unwrap());
        assert_eq!(info.autonomy_time().unwrap(), 2100);
        assert_eq!(info.manual_power_level().unwrap(), 3);
        assert!(!info.standby_mode().unwrap());
        assert!(info.is_auto().unwrap());
    }

    #[test]
    fn test_serial_number() {
        let info = DeviceInfo::new(json!({
            "component_info": {"motherboard": {"serial_number": "ABC123456"}}
        }));
        assert_eq!(info.serial_number().unwrap(), "ABC123456");
    }

    #[test]
    fn test_command_constructors() {
        assert_eq!(Command::power(Power::On), Command::new("power", 1));
        assert_eq!(Command::power(Power::Off), Command::new("power", 0));
        assert_eq!(Command::fan_speed(2, 3), Command::new("fan_2_speed", 3));
        assert_eq!(Command::airkare(true), Command::new("airkare_function", 1));
        assert_eq!(Command::easy_timer(false), Command::new("easytimer", 0));
        assert_eq!(
            Command::target_temperature(18.5),
            Command::new("enviroment_1_temperature", 18.5)
        );
    }

    #[test]
    fn test_mqtt_command_serialization() {
        let command = Command::power(Power::On);
        let body = MqttCommand {
            mac_address: "aabbccddeeff",
            command: &command,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"mac_address": "aabbccddeeff", "name": "power", "value": 1})
        );
    }
}
