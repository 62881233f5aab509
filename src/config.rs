//! Service configuration from the environment

use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineSettings;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub request_timeout: Duration,
    pub max_lines_per_order: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let or_default = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        fn num<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Invalid { name, value })
        }

        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty()).ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = num("PORT", or_default("PORT", "8083"))?;
        let db_max_connections: u32 = num("DB_MAX_CONNECTIONS", or_default("DB_MAX_CONNECTIONS", "10"))?;
        let timeout_ms: u64 = num("REQUEST_TIMEOUT_MS", or_default("REQUEST_TIMEOUT_MS", "10000"))?;
        let max_lines_per_order: usize = num("MAX_LINES_PER_ORDER", or_default("MAX_LINES_PER_ORDER", "1000"))?;
        if db_max_connections == 0 { return Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", value: "0".into() }); }
        if timeout_ms == 0 { return Err(ConfigError::Invalid { name: "REQUEST_TIMEOUT_MS", value: "0".into() }); }
        if max_lines_per_order == 0 { return Err(ConfigError::Invalid { name: "MAX_LINES_PER_ORDER", value: "0".into() }); }

        Ok(Self {
            database_url,
            port,
            db_max_connections,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            request_timeout: Duration::from_millis(timeout_ms),
            max_lines_per_order,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings { request_timeout: self.request_timeout, max_lines_per_order: self.max_lines_per_order }
    }
}
