//! Storage wiring.

use std::sync::Arc;

use credits_store::{ConfigStore, LedgerStore, MemoryStore, PgStore, ProfileStore};

use crate::config::{ServiceConfig, StoreBackend};
use crate::error::{AccountingError, Result};

/// The three storage collaborators shared by every accounting component.
#[derive(Clone)]
pub struct Stores {
    /// Append-only usage ledger.
    pub ledger: Arc<dyn LedgerStore>,

    /// Key-value configuration (tier limits, referral bonus).
    pub config: Arc<dyn ConfigStore>,

    /// User profiles.
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    /// Use one backend for all three collaborators.
    #[must_use]
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: LedgerStore + ConfigStore + ProfileStore + 'static,
    {
        Self {
            ledger: store.clone(),
            config: store.clone(),
            profiles: store,
        }
    }

    /// In-memory backend, returned alongside its handle for seeding.
    #[must_use]
    pub fn in_memory() -> (Self, MemoryStore) {
        let store = MemoryStore::new();
        (Self::shared(Arc::new(store.clone())), store)
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened, if postgres is selected
/// without a `DATABASE_URL`, or if rocksdb is selected in a build without the
/// `rocksdb-backend` feature.
pub async fn open_stores(config: &ServiceConfig) -> Result<Stores> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory ledger - usage will not survive a restart");
            Ok(Stores::in_memory().0)
        }
        StoreBackend::RocksDb => open_rocks(config),
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AccountingError::Configuration("DATABASE_URL is required for postgres".into())
            })?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "Connecting to PostgreSQL ledger"
            );
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Ok(Stores::shared(Arc::new(store)))
        }
    }
}

#[cfg(feature = "rocksdb-backend")]
fn open_rocks(config: &ServiceConfig) -> Result<Stores> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB ledger");
    let store = credits_store::RocksStore::open(&config.data_dir)?;
    Ok(Stores::shared(Arc::new(store)))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_rocks(_config: &ServiceConfig) -> Result<Stores> {
    Err(AccountingError::Configuration(
        "built without the rocksdb-backend feature".into(),
    ))
}
