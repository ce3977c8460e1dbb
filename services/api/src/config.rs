//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration;
use driverroom_core::roster::DEFAULT_OFF_DUTY_AFTER_MS;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

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
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub cors_origin: String,
    /// How long a shift may stay open before it is forced off duty.
    pub off_duty_after: Duration,
    /// How often the stale-shift sweep runs.
    pub duty_sweep_interval: std::time::Duration,
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

        // --- Load Server and Database Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections = parse_var::<u32>("DB_MAX_CONNECTIONS", "5")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:8081".to_string());

        // --- Load Duty Tracking Settings ---
        let off_duty_after_ms = parse_var::<i64>(
            "AUTO_OFF_DUTY_AFTER_MS",
            &DEFAULT_OFF_DUTY_AFTER_MS.to_string(),
        )?;
        if off_duty_after_ms <= 0 {
            return Err(ConfigError::InvalidValue(
                "AUTO_OFF_DUTY_AFTER_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let sweep_secs = parse_var::<u64>("DUTY_SWEEP_INTERVAL_SECS", "60")?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "DUTY_SWEEP_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            cors_origin,
            off_duty_after: Duration::milliseconds(off_duty_after_ms),
            duty_sweep_interval: std::time::Duration::from_secs(sweep_secs),
        })
    }

    /// A configuration for tests and local demos that never touches the environment.
    pub fn local() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: String::new(),
            db_max_connections: 1,
            log_level: Level::INFO,
            cors_origin: "http://localhost:8081".to_string(),
            off_duty_after: Duration::milliseconds(DEFAULT_OFF_DUTY_AFTER_MS),
            duty_sweep_interval: std::time::Duration::from_secs(60),
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
