use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/bookmark_tracker";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Where tracking sessions are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("Invalid SESSION_STORE value: {}", other)),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgres => f.write_str("postgres"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub time_zone: Tz,
    pub session_store: StoreBackend,
    pub store_timeout_ms: u64,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Empty means any origin.
    pub cors_allow_origins: Vec<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = var("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let time_zone_name = var("APP_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let session_store: StoreBackend = var("SESSION_STORE")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();

        let store_timeout_ms = parse_or(
            "STORE_TIMEOUT_MS",
            var("STORE_TIMEOUT_MS"),
            DEFAULT_STORE_TIMEOUT_MS,
        )?;
        if store_timeout_ms == 0 {
            return Err(anyhow!("STORE_TIMEOUT_MS must be greater than zero"));
        }

        let db_max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            var("DB_MAX_CONNECTIONS"),
            DEFAULT_DB_MAX_CONNECTIONS,
        )?;
        if db_max_connections == 0 {
            return Err(anyhow!("DB_MAX_CONNECTIONS must be greater than zero"));
        }

        let bind_addr_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr_raw
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR value: {}", bind_addr_raw))?;

        let cors_allow_origins = var("CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            database_url,
            jwt_secret,
            time_zone,
            session_store,
            store_timeout_ms,
            db_max_connections,
            bind_addr,
            cors_allow_origins,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        None => Ok(default),
    }
}
