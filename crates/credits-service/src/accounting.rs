//! Facade wiring every accounting component over one set of stores.

use std::future::Future;
use std::sync::Arc;

use credits_core::{BalanceSummary, LedgerEntry, OperationType, TierPolicy, UsageHistory, UserId};

use crate::balance::BalanceCalculator;
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::error::{AccountingError, Result};
use crate::gate::{CreditGate, Reservation};
use crate::history::HistoryReader;
use crate::quota::DailyQuota;
use crate::recorder::UsageRecorder;
use crate::state::Stores;
use crate::tiers::TierCatalog;

/// Entry point for request handlers.
///
/// Cheap to clone; clones share the stores and the reservation book.
#[derive(Debug, Clone)]
pub struct Accounting {
    catalog: TierCatalog,
    balance: BalanceCalculator,
    gate: CreditGate,
    recorder: UsageRecorder,
    history: HistoryReader,
    quota: DailyQuota,
    daily_extract_limit: u32,
}

impl Accounting {
    /// Wire the components against the wall clock.
    #[must_use]
    pub fn new(stores: Stores, config: &ServiceConfig) -> Self {
        Self::with_clock(stores, config, Arc::new(SystemClock))
    }

    /// Wire the components against an explicit clock.
    #[must_use]
    pub fn with_clock(stores: Stores, config: &ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let Stores {
            ledger,
            config: config_store,
            profiles,
        } = stores;
        let catalog = TierCatalog::new(config_store, profiles);

        Self {
            balance: BalanceCalculator::new(catalog.clone(), ledger.clone(), clock.clone()),
            gate: CreditGate::new(catalog.clone(), ledger.clone(), clock.clone()),
            recorder: UsageRecorder::new(catalog.clone(), ledger.clone(), clock.clone()),
            history: HistoryReader::new(
                ledger.clone(),
                config.default_page_size,
                config.max_page_size,
            ),
            quota: DailyQuota::new(ledger, clock),
            catalog,
            daily_extract_limit: config.daily_extract_limit,
        }
    }

    /// Tier catalog.
    #[must_use]
    pub const fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Credit gate.
    #[must_use]
    pub const fn gate(&self) -> &CreditGate {
        &self.gate
    }

    /// Policy of a tier, falling back to `free` for unknown names.
    ///
    /// # Errors
    ///
    /// See [`TierCatalog::get_tier_policy`].
    pub async fn get_tier_policy(&self, tier_name: &str) -> Result<TierPolicy> {
        self.catalog.get_tier_policy(tier_name).await
    }

    /// Resume cap of the user's tier.
    ///
    /// # Errors
    ///
    /// See [`TierCatalog::max_resumes`].
    pub async fn max_resumes(&self, user_id: &UserId) -> Result<u32> {
        self.catalog.max_resumes(user_id).await
    }

    /// Balance in the user's current period.
    ///
    /// # Errors
    ///
    /// See [`BalanceCalculator::calculate_balance`].
    pub async fn calculate_balance(&self, user_id: &UserId) -> Result<BalanceSummary> {
        self.balance.calculate_balance(user_id).await
    }

    /// Plain credit check.
    ///
    /// # Errors
    ///
    /// See [`CreditGate::has_credits`].
    pub async fn has_credits(&self, user_id: &UserId) -> Result<bool> {
        self.gate.has_credits(user_id).await
    }

    /// Hold `cost` credits for an operation in flight.
    ///
    /// # Errors
    ///
    /// See [`CreditGate::reserve`].
    pub async fn reserve(&self, user_id: &UserId, cost: i64) -> Result<Reservation> {
        self.gate.reserve(user_id, cost).await
    }

    /// Record a completed operation.
    ///
    /// # Errors
    ///
    /// See [`UsageRecorder::record_usage`].
    pub async fn record_usage(
        &self,
        user_id: &UserId,
        operation_type: OperationType,
        provider: Option<&str>,
        credits_used: i64,
    ) -> Result<LedgerEntry> {
        self.recorder
            .record_usage(user_id, operation_type, provider, credits_used)
            .await
    }

    /// Credit a referral bonus.
    ///
    /// # Errors
    ///
    /// See [`UsageRecorder::add_referral_credits`].
    pub async fn add_referral_credits(
        &self,
        user_id: &UserId,
        bonus_amount: Option<i64>,
    ) -> Result<i64> {
        self.recorder.add_referral_credits(user_id, bonus_amount).await
    }

    /// Reserve, run `work`, charge on success.
    ///
    /// # Errors
    ///
    /// See [`CreditGate::run_metered`].
    pub async fn run_metered<T, E, F, Fut>(
        &self,
        user_id: &UserId,
        operation: OperationType,
        cost: i64,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(T, Option<String>), E>>,
        E: From<AccountingError>,
    {
        self.gate.run_metered(user_id, operation, cost, work).await
    }

    /// One page of usage history.
    ///
    /// # Errors
    ///
    /// See [`HistoryReader::get_usage_history`].
    pub async fn get_usage_history(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
    ) -> Result<UsageHistory> {
        self.history.get_usage_history(user_id, page, page_size).await
    }

    /// First history page at the configured default size.
    ///
    /// # Errors
    ///
    /// See [`HistoryReader::latest`].
    pub async fn latest_usage(&self, user_id: &UserId) -> Result<UsageHistory> {
        self.history.latest(user_id).await
    }

    /// Check a daily quota for a zero-cost operation.
    ///
    /// # Errors
    ///
    /// See [`DailyQuota::check_daily_limit`].
    pub async fn check_daily_limit(
        &self,
        user_id: &UserId,
        operation: &OperationType,
        limit: u32,
    ) -> Result<u64> {
        self.quota.check_daily_limit(user_id, operation, limit).await
    }

    /// Check the job-extraction quota configured by `DAILY_EXTRACT_LIMIT`.
    ///
    /// # Errors
    ///
    /// See [`DailyQuota::check_daily_limit`].
    pub async fn check_extract_limit(&self, user_id: &UserId) -> Result<u64> {
        self.quota
            .check_daily_limit(user_id, &OperationType::ExtractJob, self.daily_extract_limit)
            .await
    }

    /// Record a zero-cost run under today's key.
    ///
    /// # Errors
    ///
    /// See [`DailyQuota::record_free_usage`].
    pub async fn record_free_usage(
        &self,
        user_id: &UserId,
        operation: OperationType,
        provider: Option<&str>,
    ) -> Result<LedgerEntry> {
        self.quota.record_free_usage(user_id, operation, provider).await
    }
}
