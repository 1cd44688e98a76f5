//! Configuration loading and representation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_VENDOR_STORE_PATH: &str = "data/vendors.json";
pub const DEFAULT_HISTORY_STORE_PATH: &str = "data/history.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime configuration of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_addr: String,
    pub vendor_store_path: PathBuf,
    pub history_store_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            vendor_store_path: PathBuf::from(DEFAULT_VENDOR_STORE_PATH),
            history_store_path: PathBuf::from(DEFAULT_HISTORY_STORE_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset or empty
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(ConfigError::Invalid {
                        key: "REQUEST_TIMEOUT_SECS",
                        expected: "a positive number of seconds",
                        value: raw.clone(),
                    })?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            http_addr: get("HTTP_ADDR").unwrap_or(defaults.http_addr),
            vendor_store_path: get("VENDOR_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.vendor_store_path),
            history_store_path: get("HISTORY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_store_path),
            request_timeout,
        })
    }
}
