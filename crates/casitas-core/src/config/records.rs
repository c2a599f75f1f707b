//! Record store configuration.

use serde::{Deserialize, Serialize};

/// Record store (inspection rows) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Provider: `"postgres"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Table holding inspection records.
    #[serde(default = "default_table")]
    pub table: String,
    /// PostgreSQL connection settings (used by the `postgres` provider).
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            table: default_table(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    #[serde(default)]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Run bundled migrations at startup.
    #[serde(default)]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: false,
        }
    }
}

fn default_provider() -> String {
    "postgres".to_string()
}

fn default_table() -> String {
    "inspections".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}
