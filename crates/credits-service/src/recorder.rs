//! Usage recording.
//!
//! Callers record only after the charged operation has succeeded; a failed
//! operation must leave no trace in the ledger.

use std::sync::Arc;

use credits_core::{LedgerEntry, OperationType, UserId, MAX_CREDIT_DELTA};
use credits_store::LedgerStore;

use crate::clock::Clock;
use crate::error::{AccountingError, Result};
use crate::tiers::TierCatalog;

/// Writes ledger entries for completed operations and bonuses.
#[derive(Clone)]
pub struct UsageRecorder {
    catalog: TierCatalog,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl UsageRecorder {
    /// Create a recorder.
    #[must_use]
    pub fn new(catalog: TierCatalog, ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            ledger,
            clock,
        }
    }

    /// Record `credits_used` for a completed operation.
    ///
    /// The entry is filed under the period of the tier the user holds right
    /// now, which may differ from the tier they held when the operation
    /// started. A negative `credits_used` credits the user.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::InvalidCost`] if `credits_used` exceeds
    /// [`MAX_CREDIT_DELTA`] in magnitude. Otherwise returns an error if the
    /// profile is missing, the tier table is malformed, or the append fails.
    pub async fn record_usage(
        &self,
        user_id: &UserId,
        operation_type: OperationType,
        provider: Option<&str>,
        credits_used: i64,
    ) -> Result<LedgerEntry> {
        check_amount(credits_used)?;
        let resolved = self.catalog.resolve_user(user_id).await?;
        let entry = LedgerEntry::new(
            *user_id,
            operation_type,
            provider.map(str::to_string),
            credits_used,
            resolved.policy.period_type,
            self.clock.now(),
        );
        self.ledger.append(&entry).await?;

        tracing::info!(
            user_id = %user_id,
            operation = %entry.operation_type,
            provider = ?entry.provider,
            credits = entry.credit_delta,
            period_key = %entry.period_key,
            "Usage recorded"
        );

        Ok(entry)
    }

    /// Credit a referral bonus and return the amount credited.
    ///
    /// Bonuses are always filed under the lifetime period, whatever the
    /// user's tier, so they never expire with a monthly cycle. Without an
    /// explicit amount the configured default applies.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::InvalidCost`] for an amount outside the
    /// single-entry range, or an error if the append fails.
    pub async fn add_referral_credits(
        &self,
        user_id: &UserId,
        bonus_amount: Option<i64>,
    ) -> Result<i64> {
        let amount = match bonus_amount {
            Some(amount) => amount,
            None => self.catalog.referral_bonus_amount().await,
        };

        check_amount(amount)?;
        let entry = LedgerEntry::referral_bonus(*user_id, amount, self.clock.now())?;
        self.ledger.append(&entry).await?;

        tracing::info!(user_id = %user_id, amount, "Referral bonus credited");
        Ok(amount)
    }
}

fn check_amount(credits: i64) -> Result<()> {
    if (-MAX_CREDIT_DELTA..=MAX_CREDIT_DELTA).contains(&credits) {
        Ok(())
    } else {
        Err(AccountingError::InvalidCost(credits))
    }
}

impl std::fmt::Debug for UsageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageRecorder")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
