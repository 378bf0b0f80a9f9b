use std::{env, fmt::Display, num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://gearguard.db?mode=rwc";

#[derive(Error, Debug)]
#[error("Invalid {key} value {value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub simulator: SimulatorSettings,
}

/// Read once at startup, never per request.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    pub enabled: bool,
    pub data_path: Option<PathBuf>,
    pub interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval: NonZeroU64 = try_load(&lookup, "SIM_INTERVAL_SECONDS", "20")?;

        Ok(Self {
            port: try_load(&lookup, "RUST_PORT", "8000")?,
            database_url: try_load(&lookup, "DATABASE_URL", DEFAULT_DATABASE_URL)?,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
            simulator: SimulatorSettings {
                enabled: lookup("SIM_ENABLE").is_some_and(|raw| is_enabled(&raw)),
                data_path: lookup("SIM_DATA_PATH")
                    .filter(|raw| !raw.trim().is_empty())
                    .map(PathBuf::from),
                interval: Duration::from_secs(interval.get()),
            },
        })
    }
}

fn is_enabled(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "True" | "yes")
}

fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key);
    if value.is_none() {
        warn!("Environment variable {key} not found, using default");
    }

    value
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(lookup, key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
