//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Event tag embedded in every pass issued for this event instance.
pub const DEFAULT_EVENT_TAG: &str = "62_crepusculo";

/// Limits enforced on a submitted application.
pub mod rules {
    /// Minimum age, in whole years, at the time of validation.
    pub const MIN_AGE: i32 = 21;
    pub const MIN_FULL_NAME_CHARS: usize = 2;
    pub const MIN_INTRODUCTION_CHARS: usize = 50;
    pub const MIN_WHY_JOIN_CHARS: usize = 50;
    pub const MIN_PHOTOS: usize = 3;
    pub const MAX_PHOTOS: usize = 5;
    /// Largest accepted photo upload.
    pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
}

/// Server configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub photo_dir: PathBuf,
    /// Base URL the service is reachable at (QR payloads, photo URLs).
    pub public_url: Url,
    pub event_tag: String,
    /// Upper bound on a single flow derivation's backend reads.
    pub flow_timeout: Duration,
    /// Directory for the rolling log file, if file logging is enabled.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            db_path: PathBuf::from("./data/crepusculo.db"),
            photo_dir: PathBuf::from("./data/photos"),
            public_url: Url::parse("http://localhost:8080").expect("static URL is valid"),
            event_tag: DEFAULT_EVENT_TAG.to_string(),
            flow_timeout: Duration::from_secs(10),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("CREPUSCULO_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "CREPUSCULO_PORT".into(),
                message: e.to_string(),
            })?,
            None => defaults.port,
        };

        let public_url = match lookup("CREPUSCULO_PUBLIC_URL") {
            Some(raw) => Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                key: "CREPUSCULO_PUBLIC_URL".into(),
                message: e.to_string(),
            })?,
            None => defaults.public_url,
        };

        let flow_timeout = match lookup("CREPUSCULO_FLOW_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "CREPUSCULO_FLOW_TIMEOUT_SECS".into(),
                    message: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "CREPUSCULO_FLOW_TIMEOUT_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.flow_timeout,
        };

        let event_tag = lookup("CREPUSCULO_EVENT_TAG")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.event_tag);

        Ok(Self {
            bind: lookup("CREPUSCULO_BIND").unwrap_or(defaults.bind),
            port,
            db_path: lookup("CREPUSCULO_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            photo_dir: lookup("CREPUSCULO_PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.photo_dir),
            public_url,
            event_tag,
            flow_timeout,
            log_dir: lookup("CREPUSCULO_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Address string for the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
