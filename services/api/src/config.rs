//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use summary_player_core::PlayerOptions;
use tracing::Level;

/// The summary document fetched when no `SUMMARY_URL` is configured.
pub const DEFAULT_SUMMARY_URL: &str = "https://gist.githubusercontent.com/kravtsov798/a3e11ce9528c1966131de0dd0d9f6188/raw/79f7750a6115167f1485f0bc1dcfc86727484f0e/summary.txt";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub summary_url: String,
    pub fetch_timeout: Duration,
    pub position_interval: Duration,
    pub seek_forward_secs: f64,
    pub seek_backward_secs: f64,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Summary Source Settings ---
        let summary_url = lookup("SUMMARY_URL").unwrap_or_else(|| DEFAULT_SUMMARY_URL.to_string());
        if summary_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("SUMMARY_URL".to_string()));
        }
        let fetch_timeout_secs: u64 = parse_or(&lookup, "FETCH_TIMEOUT_SECS", Some(30))?;

        // --- Player Settings ---
        let position_interval_ms: u64 = parse_or(&lookup, "POSITION_INTERVAL_MS", Some(1000))?;
        if position_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "POSITION_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let seek_forward_secs = parse_seconds(&lookup, "SEEK_FORWARD_SECS", 10.0)?;
        let seek_backward_secs = parse_seconds(&lookup, "SEEK_BACKWARD_SECS", 5.0)?;

        Ok(Self {
            bind_address,
            log_level,
            summary_url,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            position_interval: Duration::from_millis(position_interval_ms),
            seek_forward_secs,
            seek_backward_secs,
            allowed_origin,
        })
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            seek_forward: self.seek_forward_secs,
            seek_backward: self.seek_backward_secs,
            position_interval: self.position_interval,
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}

fn parse_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let seconds: f64 = parse_or(lookup, name, Some(default))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive number of seconds", seconds),
        ));
    }
    Ok(seconds)
}
