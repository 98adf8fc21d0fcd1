use std::fmt;

#[derive(Debug)]
pub enum Error {
    Config(String),
    Auth(String),
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
    InvalidMac(String),
    MissingField(String),
    InvalidField(String),
    Http(reqwest::Error),
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    #[cfg(feature = "ble")]
    Bluetooth(btleplug::Error),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Error::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Error::InvalidMac(mac) => write!(f, "Invalid MAC address: {}", mac),
            Error::MissingField(path) => write!(f, "Field not found in device info: {}", path),
            Error::InvalidField(path) => {
                write!(f, "Field has an unexpected value in device info: {}", path)
            }
            Error::Http(err) => write!(f, "HTTP error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Yaml(err) => write!(f, "YAML parsing error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            #[cfg(feature = "ble")]
            Error::Bluetooth(err) => write!(f, "Bluetooth error: {}", err),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Json(err) => Some(err),
            #[cfg(feature = "ble")]
            Error::Bluetooth(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

#[cfg(feature = "ble")]
impl From<btleplug::Error> for Error {
    fn from(err: btleplug::Error) -> Self {
        Error::Bluetooth(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
