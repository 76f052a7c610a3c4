//! Service configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::{AccountingError, Result};

/// Ledger storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process maps; data is lost on exit.
    #[default]
    Memory,
    /// Embedded `RocksDB` under `data_dir` (feature `rocksdb-backend`).
    RocksDb,
    /// PostgreSQL at `database_url`.
    Postgres,
}

impl StoreBackend {
    /// Name used in `LEDGER_BACKEND`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::RocksDb => "rocksdb",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown ledger backend: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Storage backend (default: memory).
    pub backend: StoreBackend,

    /// Path to `RocksDB` data directory (default: "/data/credits").
    pub data_dir: String,

    /// PostgreSQL connection string, required for the postgres backend.
    pub database_url: Option<String>,

    /// PostgreSQL pool size (default: 5).
    pub database_max_connections: u32,

    /// History page size when the caller has no preference (default: 20).
    pub default_page_size: u32,

    /// Largest accepted history page size (default: 100).
    pub max_page_size: u32,

    /// Job extractions allowed per user per UTC day (default: 50).
    pub daily_extract_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            data_dir: "/data/credits".into(),
            database_url: None,
            database_max_connections: 5,
            default_page_size: 20,
            max_page_size: 100,
            daily_extract_limit: 50,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults, as do unparsable numbers.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::Configuration`] if `LEDGER_BACKEND` names
    /// no known backend.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through `var`, which looks up one variable by name.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let parse = |name: &str| var(name).and_then(|s| s.parse().ok());

        let backend = match var("LEDGER_BACKEND") {
            Some(raw) => raw
                .parse::<StoreBackend>()
                .map_err(AccountingError::Configuration)?,
            None => defaults.backend,
        };

        Ok(Self {
            backend,
            data_dir: var("DATA_DIR").unwrap_or(defaults.data_dir),
            database_url: var("DATABASE_URL"),
            database_max_connections: parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            default_page_size: parse("DEFAULT_PAGE_SIZE").unwrap_or(defaults.default_page_size),
            max_page_size: parse("MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size),
            daily_extract_limit: parse("DAILY_EXTRACT_LIMIT")
                .unwrap_or(defaults.daily_extract_limit),
        })
    }
}
