//! Configuration Module
//!
//! Environment-selected endpoints and polling intervals.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const PRODUCTION_API_URL: &str = "https://api.mapic.app";
const PRODUCTION_WS_URL: &str = "wss://api.mapic.app/ws";
const DEVELOPMENT_API_URL: &str = "http://localhost:8080";
const DEVELOPMENT_WS_URL: &str = "ws://localhost:8080/ws";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_FRIENDS_POLL_MS: u64 = 5_000;
const DEFAULT_OWN_LOCATION_MS: u64 = 10_000;

/// Deployment environment the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn api_url(self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_API_URL,
            Environment::Production => PRODUCTION_API_URL,
        }
    }

    fn ws_url(self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_WS_URL,
            Environment::Production => PRODUCTION_WS_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub api_base_url: String,
    pub ws_url: String,
    pub request_timeout: Duration,
    pub friends_poll_interval: Duration,
    pub own_location_interval: Duration,
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from `MAPIC_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = parse_or(&lookup, "MAPIC_ENV", Environment::Production);

        let api_base_url = lookup("MAPIC_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| environment.api_url().to_string());
        let ws_url = lookup("MAPIC_WS_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| environment.ws_url().to_string());

        let data_dir = lookup("MAPIC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            environment,
            api_base_url,
            ws_url,
            request_timeout: millis(&lookup, "MAPIC_REQUEST_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            friends_poll_interval: millis(&lookup, "MAPIC_FRIENDS_POLL_MS", DEFAULT_FRIENDS_POLL_MS),
            own_location_interval: millis(&lookup, "MAPIC_OWN_LOCATION_MS", DEFAULT_OWN_LOCATION_MS),
            data_dir,
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {} value '{}': {}, using default", key, raw, e);
            default
        }),
        None => default,
    }
}

fn millis<F>(lookup: &F, key: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse_or(lookup, key, default);
    if ms == 0 {
        warn!("{} must be positive, using default", key);
        return Duration::from_millis(default);
    }
    Duration::from_millis(ms)
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MAPIC")
}
