//! In-memory storage backend.
//!
//! Cheap to clone (the data sits behind an `Arc`). Every clone sees the same
//! ledger, configuration and profiles.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use credits_core::{LedgerEntry, PeriodDelta, PeriodKey, PeriodType, UserId, UserProfile};

use crate::error::Result;
use crate::{ConfigStore, LedgerStore, ProfileStore};

/// In-memory implementation of all three store traits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    ledger: RwLock<HashMap<UserId, Vec<LedgerEntry>>>,
    config: RwLock<HashMap<String, serde_json::Value>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a configuration value.
    pub fn put_config(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Remove a configuration value.
    pub fn remove_config(&self, key: &str) {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Insert or replace a profile.
    pub fn put_profile(&self, profile: UserProfile) {
        self.inner
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.user_id, profile);
    }

    /// Every entry a user owns, in insertion order (for tests).
    #[must_use]
    pub fn entries_for(&self, user_id: &UserId) -> Vec<LedgerEntry> {
        self.inner
            .ledger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        self.inner
            .ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entry.user_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn period_deltas(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
        period_key: &PeriodKey,
    ) -> Result<Vec<PeriodDelta>> {
        let ledger = self.inner.ledger.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ledger
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|e| e.period_type == period_type && &e.period_key == period_key)
            .map(LedgerEntry::delta)
            .collect())
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.entries_for(user_id);
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_for_user(&self, user_id: &UserId) -> Result<u64> {
        let ledger = self.inner.ledger.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ledger.get(user_id).map_or(0, |entries| entries.len() as u64))
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        Ok(self
            .inner
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }
}
