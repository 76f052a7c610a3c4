//! `RocksDB` storage implementation.
//!
//! Entries are written once and indexed twice (by user for history, by
//! period for aggregation) in a single `WriteBatch`, so an append is atomic
//! and never rewrites an existing key.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use credits_core::{LedgerEntry, PeriodDelta, PeriodKey, PeriodType, UserId, UserProfile};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{ConfigStore, LedgerStore, ProfileStore};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or replace a profile.
    ///
    /// Profiles are owned by the auth collaborator; this exists for seeding
    /// local databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        let cf = self.cf(cf::PROFILES)?;
        self.db
            .put_cf(&cf, keys::profile_key(&profile.user_id), Self::serialize(profile)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Write a configuration value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let cf = self.cf(cf::CONFIG)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db
            .put_cf(&cf, keys::config_key(key), bytes)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_entry(&self, key: &[u8]) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::LEDGER)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}

#[async_trait]
impl LedgerStore for RocksStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let cf_ledger = self.cf(cf::LEDGER)?;
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;
        let cf_by_period = self.cf(cf::LEDGER_BY_PERIOD)?;

        let period_key =
            keys::period_entry_key(&entry.user_id, entry.period_type, &entry.period_key, &entry.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_ledger, keys::entry_key(&entry.id), Self::serialize(entry)?);
        batch.put_cf(&cf_by_user, keys::user_entry_key(&entry.user_id, &entry.id), b"");
        batch.put_cf(&cf_by_period, period_key, Self::serialize(&entry.delta())?);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn period_deltas(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
        period_key: &PeriodKey,
    ) -> Result<Vec<PeriodDelta>> {
        let cf_by_period = self.cf(cf::LEDGER_BY_PERIOD)?;
        let prefix = keys::period_prefix(user_id, period_type, period_key);

        let mut deltas = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_by_period, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            deltas.push(Self::deserialize(&value)?);
        }
        Ok(deltas)
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;
        let prefix = keys::user_prefix(user_id);

        // Seek to the end of the user's range and walk backwards: newest first.
        let mut upper = prefix.clone();
        upper.extend_from_slice(&[0xFF; 16]);
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&upper, Direction::Reverse));

        let mut entries = Vec::with_capacity(limit);
        for item in iter.skip(offset) {
            if entries.len() >= limit {
                break;
            }
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let entry_id = keys::entry_id_from_user_key(&key).ok_or_else(|| StoreError::Corrupt {
                entity: "ledger index",
                reason: format!("unexpected key length {}", key.len()),
            })?;
            if let Some(entry) = self.get_entry(&keys::entry_key(&entry_id))? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn count_for_user(&self, user_id: &UserId) -> Result<u64> {
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;
        let prefix = keys::user_prefix(user_id);

        let mut count = 0;
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl ConfigStore for RocksStore {
    async fn get_config(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let cf = self.cf(cf::CONFIG)?;
        self.db
            .get_cf(&cf, keys::config_key(key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| {
                serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl ProfileStore for RocksStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let cf = self.cf(cf::PROFILES)?;
        self.db
            .get_cf(&cf, keys::profile_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}
