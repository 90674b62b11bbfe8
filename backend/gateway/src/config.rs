use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{error::ConfigError, remote::resolve_address};

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_MLSOLID_ADDR: &str = "mlsolid-service:5000";
pub const DEFAULT_BUCKET: &str = "goml-data";
pub const DEFAULT_ENDPOINT: &str = "http://garage-s3.garage.svc.cluster.local:3900";
pub const DEFAULT_TIMEOUT_SECS: &str = "5";

const SECRETS_DIR: &str = "/run/secrets";

pub struct Config {
    pub port: u16,
    pub mlsolid_addr: String,
    pub rpc_timeout: Duration,
    pub connect_timeout: Duration,
    /// `None` when persistence is switched off with `S3_ENABLED=false`.
    pub storage: Option<StorageConfig>,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub endpoint: String,
    pub upload_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_enabled: bool = try_load(&lookup, "S3_ENABLED", "true")?;

        let storage = if storage_enabled {
            Some(StorageConfig::from_lookup(&lookup)?)
        } else {
            info!("S3_ENABLED is false, results will not be persisted");
            None
        };

        Ok(Self {
            port: try_load(&lookup, "PORT", DEFAULT_PORT)?,
            mlsolid_addr: resolve_address(lookup("MLSOLID_SERVICE_ADDR")),
            rpc_timeout: try_load_secs(&lookup, "RPC_TIMEOUT_SECS")?,
            connect_timeout: try_load_secs(&lookup, "CONNECT_TIMEOUT_SECS")?,
            storage,
        })
    }
}

impl StorageConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            access_key: read_secret(lookup, "SA_ACCESS_KEY"),
            secret_key: read_secret(lookup, "SA_SECRET_KEY"),
            bucket: try_load(lookup, "S3_BUCKET", DEFAULT_BUCKET)?,
            endpoint: try_load(lookup, "S3_ENDPOINT", DEFAULT_ENDPOINT)?,
            upload_timeout: try_load_secs(lookup, "S3_UPLOAD_TIMEOUT_SECS")?,
        })
    }
}

/// Unset and blank variables are treated the same.
fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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

        ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}

fn try_load_secs<F>(lookup: &F, key: &'static str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = try_load(lookup, key, DEFAULT_TIMEOUT_SECS)?;

    if secs == 0 {
        warn!("Invalid {key} value: must be at least one second");

        return Err(ConfigError::InvalidValue {
            key,
            value: secs.to_string(),
            reason: "must be at least one second".to_string(),
        });
    }

    Ok(Duration::from_secs(secs))
}

/// Environment first, then the mounted secret file. Missing credentials are
/// left empty; the object store rejects them on first use.
fn read_secret<F>(lookup: &F, secret_name: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(lookup, secret_name) {
        return value;
    }

    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|e| {
            warn!("{secret_name} not set and failed to read {path}: {e}");
            String::new()
        })
}
