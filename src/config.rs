use dirs::home_dir;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::AuthTokens;
use crate::error::{Error, Result};

/// Configuration data stored in ~/.edilkamin.yml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub legacy: bool,
    /// Tokens from the last successful sign-in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<AuthTokens>,
}

/// Get the path to the configuration file (~/.edilkamin.yml)
pub fn get_config_path() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Failed to determine home directory".into()))?;
    Ok(home.join(".edilkamin.yml"))
}

/// Load configuration from ~/.edilkamin.yml, or defaults when it does not exist
pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No configuration file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    debug!(
        "Loaded configuration for user: {}",
        config.username.as_deref().unwrap_or("<none>")
    );
    Ok(config)
}

/// Save configuration to ~/.edilkamin.yml
pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_path()?)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    let content = serde_yaml::to_string(config)?;
    fs::write(path, content)?;
    debug!("Saved configuration to {}", path.display());
    Ok(())
}

/// Clear the configuration file (logout)
pub fn clear_config() -> Result<()> {
    clear_config_at(&get_config_path()?)
}

pub fn clear_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
        debug!("Configuration file cleared");
    } else {
        warn!("Configuration file does not exist, nothing to clear");
    }
    Ok(())
}
