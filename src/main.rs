use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use notify_rust::Notification;
use std::time::Duration;
use tabled::{Table, Tabled};

use edilkamin::auth::is_token_expired;
use edilkamin::config::{clear_config, load_config, save_config, Config};
use edilkamin::{format_mac, DeviceInfo, EdilkaminClient, Power};

/// Seconds before expiry at which a cached token is no longer used.
const TOKEN_EXPIRY_BUFFER: u64 = 60;

#[derive(Parser)]
#[command(name = "edilkamin")]
#[command(about = "A CLI for controlling Edilkamin pellet stoves")]
#[command(version)]
struct Cli {
    /// Username for the Edilkamin account
    #[arg(short, long, global = true, env = "EDILKAMIN_USERNAME")]
    username: Option<String>,

    /// Password for the Edilkamin account
    #[arg(short, long, global = true, env = "EDILKAMIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// MAC address of the stove
    #[arg(short, long, global = true, env = "EDILKAMIN_MAC_ADDRESS")]
    mac_address: Option<String>,

    /// Use the legacy API (also enabled by EDILKAMIN_USE_LEGACY_API=1)
    #[arg(long, global = true)]
    legacy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and cache the tokens in ~/.edilkamin.yml
    Login,
    /// Forget cached credentials
    Logout,
    /// Print the raw device info document
    Info {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Show a summary of the stove state
    Status,
    /// Turn the stove on
    PowerOn {
        /// Wait until the stove reports it is on
        #[arg(long)]
        wait: bool,
    },
    /// Turn the stove off
    PowerOff,
    /// Set the target temperature
    SetTemperature {
        /// Temperature in degrees Celsius
        celsius: f64,
    },
    /// Scan for nearby stoves over Bluetooth
    Discover {
        /// Print Bluetooth addresses instead of Wi-Fi MACs
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Property")]
    property: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Whether an `EDILKAMIN_USE_LEGACY_API` value turns the legacy API on.
fn legacy_from_env(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// The flag wins, then a set environment variable (even a false one), then
/// the saved setting.
fn resolve_legacy(flag: bool, env: Option<&str>, saved: bool) -> bool {
    if flag {
        return true;
    }
    match env {
        Some(value) => legacy_from_env(Some(value)),
        None => saved,
    }
}

fn next_delay(delay: Duration, max_delay: Duration) -> Duration {
    std::cmp::min(delay * 2, max_delay)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Cli {
        username,
        password,
        mac_address,
        legacy,
        command,
    } = Cli::parse();

    let mut config = load_config().context("Failed to load configuration")?;
    let legacy_env = std::env::var("EDILKAMIN_USE_LEGACY_API").ok();
    let requested_legacy = legacy;
    let legacy = resolve_legacy(requested_legacy, legacy_env.as_deref(), config.legacy);

    match command {
        Commands::Login => {
            let username = username
                .or_else(|| config.username.clone())
                .ok_or_else(missing("Username", "--username", "EDILKAMIN_USERNAME"))?;
            let password = match password {
                Some(password) => password,
                None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
            };

            // Only an explicit request is remembered, so a plain login resets it.
            let legacy = resolve_legacy(requested_legacy, legacy_env.as_deref(), false);
            let mut client = EdilkaminClient::new_for_api(legacy);
            info!("Signing in as {}...", username);
            let tokens = client
                .sign_in(&username, &password)
                .await
                .context("Authentication failed")?;

            if let Some(mac) = mac_address {
                config.mac_address = Some(format_mac(&mac)?);
            }
            config.username = Some(username.clone());
            config.legacy = legacy;
            config.tokens = Some(tokens);
            save_config(&config).context("Failed to save configuration")?;
            println!("Logged in as {}.", username);
        }
        Commands::Logout => {
            clear_config().context("Failed to clear configuration")?;
            println!("Logged out.");
        }
        Commands::Discover { raw } => discover(!raw).await?,
        Commands::Info { pretty } => {
            let mac = resolve_mac(mac_address, &config)?;
            let client = connect(&mut config, username, password, legacy).await?;
            let info = client.device_info(&mac).await?;
            let output = if pretty {
                serde_json::to_string_pretty(info.as_value())?
            } else {
                serde_json::to_string(info.as_value())?
            };
            println!("{}", output);
        }
        Commands::Status => {
            let mac = resolve_mac(mac_address, &config)?;
            let client = connect(&mut config, username, password, legacy).await?;
            let info = client.device_info(&mac).await?;
            println!("{}", Table::new(status_rows(&info)));
        }
        Commands::PowerOn { wait } => {
            let mac = resolve_mac(mac_address, &config)?;
            let client = connect(&mut config, username, password, legacy).await?;
            info!("Turning on stove {}", mac);
            client
                .set_power_on(&mac)
                .await
                .context("Failed to turn on device")?;

            if wait {
                wait_for_power_on(&client, &mac).await?;
            } else {
                println!("Stove {} turned on.", mac);
            }
        }
        Commands::PowerOff => {
            let mac = resolve_mac(mac_address, &config)?;
            let client = connect(&mut config, username, password, legacy).await?;
            info!("Turning off stove {}", mac);
            client
                .set_power_off(&mac)
                .await
                .context("Failed to turn off device")?;
            println!("Stove {} turned off.", mac);
        }
        Commands::SetTemperature { celsius } => {
            let mac = resolve_mac(mac_address, &config)?;
            let client = connect(&mut config, username, password, legacy).await?;
            client
                .set_target_temperature(&mac, celsius)
                .await
                .context("Failed to set temperature")?;
            println!("Target temperature set to {}°C.", celsius);
        }
    }

    Ok(())
}

fn missing(
    what: &'static str,
    flag: &'static str,
    env: &'static str,
) -> impl FnOnce() -> anyhow::Error {
    move || anyhow!("{} required. Use {} or set {}.", what, flag, env)
}

fn resolve_mac(mac_address: Option<String>, config: &Config) -> Result<String> {
    let mac = mac_address
        .or_else(|| config.mac_address.clone())
        .ok_or_else(missing("MAC address", "--mac-address", "EDILKAMIN_MAC_ADDRESS"))?;
    Ok(format_mac(&mac)?)
}

/// Build an authenticated client for the configured API. New tokens are
/// written back to the config file.
async fn connect(
    config: &mut Config,
    username: Option<String>,
    password: Option<String>,
    legacy: bool,
) -> Result<EdilkaminClient> {
    let mut client = EdilkaminClient::new_for_api(legacy);
    if resolve_tokens(&mut client, config, username, password).await? {
        save_config(config).context("Failed to save configuration")?;
    }
    Ok(client)
}

/// Give `client` a bearer token, preferring a cached token, then a refresh,
/// then a fresh sign-in. Returns whether `config` got new tokens.
async fn resolve_tokens(
    client: &mut EdilkaminClient,
    config: &mut Config,
    username: Option<String>,
    password: Option<String>,
) -> Result<bool> {
    // Cached tokens only count for the account they were issued to.
    let same_user = username.is_none() || username == config.username;
    if let Some(tokens) = config.tokens.clone().filter(|_| same_user) {
        let bearer = tokens.bearer(client.is_legacy());
        if !is_token_expired(bearer, TOKEN_EXPIRY_BUFFER) {
            debug!("Using cached token");
            client.set_access_token(bearer);
            return Ok(false);
        }

        if let Some(refresh_token) = tokens.refresh_token.as_deref() {
            match client.refresh(refresh_token).await {
                Ok(tokens) => {
                    debug!("Refreshed cached token");
                    config.tokens = Some(tokens);
                    return Ok(true);
                }
                Err(e) => warn!("Token refresh failed: {}", e),
            }
        }
    }

    let username = username
        .or_else(|| config.username.clone())
        .ok_or_else(missing("Username", "--username", "EDILKAMIN_USERNAME"))?;
    let password =
        password.ok_or_else(missing("Password", "--password", "EDILKAMIN_PASSWORD"))?;

    info!("Authenticating with Edilkamin...");
    let tokens = client
        .sign_in(&username, &password)
        .await
        .context("Authentication failed")?;
    debug!("Authentication successful");

    config.username = Some(username);
    config.tokens = Some(tokens);
    Ok(true)
}

fn show<T: std::fmt::Display>(value: edilkamin::Result<T>) -> String {
    value.map_or_else(|_| "Unknown".to_string(), |v| v.to_string())
}

fn status_rows(info: &DeviceInfo) -> Vec<StatusRow> {
    vec![
        StatusRow {
            property: "Power",
            value: show(info.power()),
        },
        StatusRow {
            property: "Room temperature (°C)",
            value: show(info.environment_temperature()),
        },
        StatusRow {
            property: "Target temperature (°C)",
            value: show(info.target_temperature()),
        },
        StatusRow {
            property: "Fan 1 speed",
            value: show(info.fan_speed(1)),
        },
        StatusRow {
            property: "Power level",
            value: show(info.manual_power_level()),
        },
        StatusRow {
            property: "Auto mode",
            value: show(info.is_auto()),
        },
        StatusRow {
            property: "Autonomy (s)",
            value: show(info.autonomy_time()),
        },
        StatusRow {
            property: "Pellet reserve low",
            value: show(info.pellet_reserve()),
        },
    ]
}

/// Poll the stove with exponential backoff (2s doubling up to 30s) until it
/// reports power on, then send a desktop notification.
async fn wait_for_power_on(client: &EdilkaminClient, mac: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Waiting for stove to turn on...");

    let mut delay = Duration::from_secs(2);
    let max_delay = Duration::from_secs(30);

    loop {
        tokio::time::sleep(delay).await;

        match client.get_power(mac).await {
            Ok(Power::On) => {
                spinner.finish_with_message("Stove is on! 🔥");

                if let Err(e) = Notification::new()
                    .summary("Edilkamin stove")
                    .body("Your stove is on.")
                    .timeout(5000)
                    .show()
                {
                    warn!("Failed to send notification: {}", e);
                }

                return Ok(());
            }
            Ok(Power::Off) => spinner.set_message("Stove starting up..."),
            Err(e) => spinner.set_message(format!("Error checking status: {}", e)),
        }

        delay = next_delay(delay, max_delay);
    }
}

#[cfg(feature = "ble")]
async fn discover(convert: bool) -> Result<()> {
    use edilkamin::ble::{discover_devices, DEFAULT_SCAN_DURATION};

    let devices = discover_devices(convert, DEFAULT_SCAN_DURATION).await?;
    if devices.is_empty() {
        eprintln!("No Edilkamin devices found.");
        std::process::exit(1);
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

#[cfg(not(feature = "ble"))]
async fn discover(_convert: bool) -> Result<()> {
    Err(anyhow!(
        "BLE support not enabled. Rebuild with `--features ble` to scan for stoves."
    ))
}
