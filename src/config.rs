use std::time::Duration;

use serde::Deserialize;

/// Default bound applied to every store call.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub max_connections: u32,
    pub query_timeout_secs: u64,
}

impl DbConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db: DbConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let defaults = DbConfig::default();
        let db = DbConfig {
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_connections),
            query_timeout_secs: std::env::var("DB_QUERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.query_timeout_secs),
        };
        Ok(Self { database_url, db })
    }
}
