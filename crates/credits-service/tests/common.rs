//! Common test utilities for accounting integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use credits_core::{LedgerEntry, OperationType, UserId, UserProfile};
use credits_service::{Accounting, FixedClock, ServiceConfig, Stores};
use credits_store::MemoryStore;

/// Mid-February 2026, 10:00 UTC.
pub fn feb_2026() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap()
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The facade under test.
    pub accounting: Accounting,
    /// Direct handle on the backing store, for seeding and inspection.
    pub store: MemoryStore,
    /// The clock every component reads.
    pub clock: Arc<FixedClock>,
}

impl TestHarness {
    /// Fresh store, clock frozen at [`feb_2026`].
    pub fn new() -> Self {
        Self::at(feb_2026())
    }

    /// Fresh store, clock frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::with_config(now, &ServiceConfig::default())
    }

    /// Fresh store with explicit configuration.
    pub fn with_config(now: DateTime<Utc>, config: &ServiceConfig) -> Self {
        let (stores, store) = Stores::in_memory();
        let clock = Arc::new(FixedClock::new(now));
        let accounting = Accounting::with_clock(stores, config, clock.clone());
        Self {
            accounting,
            store,
            clock,
        }
    }

    /// Create a user with a profile on `tier`.
    pub fn user(&self, tier: &str) -> UserId {
        let user_id = UserId::generate();
        self.store.put_profile(UserProfile::new(user_id, tier));
        user_id
    }

    /// Move a user to another tier.
    pub fn set_tier(&self, user_id: UserId, tier: &str) {
        self.store.put_profile(UserProfile::new(user_id, tier));
    }

    /// Record `count` entries of `credits` each.
    pub async fn record_many(
        &self,
        user_id: &UserId,
        operation: OperationType,
        credits: i64,
        count: usize,
    ) {
        for _ in 0..count {
            self.accounting
                .record_usage(user_id, operation.clone(), Some("claude"), credits)
                .await
                .expect("record usage");
        }
    }

    /// Everything the user has in the ledger.
    pub fn entries(&self, user_id: &UserId) -> Vec<LedgerEntry> {
        self.store.entries_for(user_id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
