//! Daily quotas for operations that cost no credits.
//!
//! Such operations are still rate limited: each run writes a zero-delta
//! entry under the `(daily, YYYY-MM-DD)` period and the quota counts them.
//! Zero deltas under a daily key never touch lifetime or monthly balances.

use std::sync::Arc;

use credits_core::{LedgerEntry, OperationType, PeriodKey, PeriodType, UserId};
use credits_store::LedgerStore;

use crate::clock::Clock;
use crate::error::{AccountingError, Result};

/// Count-based limit per user per UTC day.
#[derive(Clone)]
pub struct DailyQuota {
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl DailyQuota {
    /// Create a quota tracker.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Entries of `operation` the user recorded today.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn used_today(&self, user_id: &UserId, operation: &OperationType) -> Result<u64> {
        let today = PeriodKey::for_instant(PeriodType::Daily, self.clock.now());
        let deltas = self
            .ledger
            .period_deltas(user_id, PeriodType::Daily, &today)
            .await?;
        Ok(deltas
            .iter()
            .filter(|d| &d.operation_type == operation)
            .count() as u64)
    }

    /// Fail once the user has run `operation` `limit` times today.
    ///
    /// Returns the count used so far when the call is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::DailyLimitExceeded`] at or above the limit.
    pub async fn check_daily_limit(
        &self,
        user_id: &UserId,
        operation: &OperationType,
        limit: u32,
    ) -> Result<u64> {
        let used = self.used_today(user_id, operation).await?;
        if used >= u64::from(limit) {
            tracing::warn!(
                user_id = %user_id,
                operation = %operation,
                used,
                limit,
                "Daily limit exceeded"
            );
            return Err(AccountingError::DailyLimitExceeded {
                operation: operation.clone(),
                used,
                limit,
            });
        }
        Ok(used)
    }

    /// Record one zero-cost run of `operation` under today's key.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub async fn record_free_usage(
        &self,
        user_id: &UserId,
        operation: OperationType,
        provider: Option<&str>,
    ) -> Result<LedgerEntry> {
        let entry = LedgerEntry::new(
            *user_id,
            operation,
            provider.map(str::to_string),
            0,
            PeriodType::Daily,
            self.clock.now(),
        );
        self.ledger.append(&entry).await?;

        tracing::info!(
            user_id = %user_id,
            operation = %entry.operation_type,
            provider = ?entry.provider,
            day = %entry.period_key,
            "Free usage recorded"
        );
        Ok(entry)
    }
}

impl std::fmt::Debug for DailyQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyQuota")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
