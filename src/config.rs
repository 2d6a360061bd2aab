use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub field_encryption_key: String,

    // Rate limiting
    pub rate_upload_per_min: u32,
    pub rate_kpi_per_min: u32,

    pub max_upload_bytes: usize,
    pub api_prefix: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            field_encryption_key: required("FIELD_ENCRYPTION_KEY")?,

            rate_upload_per_min: parsed(&lookup, "RATE_UPLOAD_PER_MIN", 30)?,
            rate_kpi_per_min: parsed(&lookup, "RATE_KPI_PER_MIN", 1000)?,

            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
