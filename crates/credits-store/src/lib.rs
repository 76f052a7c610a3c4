//! Storage layer for the usage credit ledger.
//!
//! Three collaborators are abstracted here:
//!
//! - [`LedgerStore`]: the append-only ledger of usage events
//! - [`ConfigStore`]: the key-value configuration table (tier limits, bonus amount)
//! - [`ProfileStore`]: read access to user profiles
//!
//! Backends:
//!
//! - [`MemoryStore`]: in-process maps, for tests and local development
//! - [`PgStore`]: PostgreSQL via `sqlx` (tables `usage_events`, `global_config`, `profiles`)
//! - `RocksStore` (feature `rocksdb-backend`): embedded `RocksDB` with column families
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use credits_core::{LedgerEntry, OperationType, PeriodKey, PeriodType, UserId};
//! use credits_store::{LedgerStore, MemoryStore};
//!
//! # async fn example() -> credits_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//!
//! let entry = LedgerEntry::new(
//!     user_id,
//!     OperationType::Match,
//!     Some("claude".into()),
//!     1,
//!     PeriodType::Lifetime,
//!     Utc::now(),
//! );
//! store.append(&entry).await?;
//!
//! let deltas = store
//!     .period_deltas(&user_id, PeriodType::Lifetime, &PeriodKey::lifetime())
//!     .await?;
//! assert_eq!(deltas.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use credits_core::{LedgerEntry, PeriodDelta, PeriodKey, PeriodType, UserId, UserProfile};

/// The append-only ledger.
///
/// There are deliberately no update or delete operations: erasing a user's
/// entries is the account-deletion collaborator's job.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append one entry.
    ///
    /// Concurrent appends for the same user must all be kept; implementations
    /// insert new rows and never rewrite a shared counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn append(&self, entry: &LedgerEntry) -> Result<()>;

    /// Operation type and delta of every entry in one period of one user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn period_deltas(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
        period_key: &PeriodKey,
    ) -> Result<Vec<PeriodDelta>>;

    /// A user's entries, newest first.
    ///
    /// Order is by `created_at`, then by entry id. Entry ids created in one
    /// millisecond increase in creation order, so a backend may order by id
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn history(&self, user_id: &UserId, limit: usize, offset: usize)
        -> Result<Vec<LedgerEntry>>;

    /// Total number of entries a user owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_for_user(&self, user_id: &UserId) -> Result<u64>;
}

/// Key-value configuration maintained by an administrative process.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a configuration value; `None` if the key was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_config(&self, key: &str) -> Result<Option<serde_json::Value>>;
}

/// Read access to user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a user's profile; `None` if the user has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>>;
}
