use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::provider::DEFAULT_BASE_URL;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: Option<u64>,
    pub request_timeout_secs: u64,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `load` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openweather_api_key = lookup("OPENWEATHER_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && key != "YOUR_API_KEY_HERE");

        let openweather_base_url = lookup("OPENWEATHER_BASE_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let cache_ttl_secs = parse_var(&lookup, "CACHE_TTL")?.unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let cache_max_entries = parse_var(&lookup, "CACHE_MAX_ENTRIES")?;
        let request_timeout_secs =
            parse_var(&lookup, "REQUEST_TIMEOUT")?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);

        anyhow::ensure!(request_timeout_secs > 0, "REQUEST_TIMEOUT must be at least 1 second");

        Ok(Self {
            openweather_api_key,
            openweather_base_url,
            cache_ttl_secs,
            cache_max_entries,
            request_timeout_secs,
            port,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name).map(|raw| raw.trim().to_string()) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {name}: {raw:?}")),
    }
}
