//! Balance derivation.
//!
//! Nothing here is cached: every summary is recomputed from the ledger, so two
//! calls without an intervening write return identical results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use credits_core::{BalanceSummary, PeriodKey, PeriodUsage, TierPolicy, UserId};
use credits_store::LedgerStore;

use crate::clock::Clock;
use crate::error::Result;
use crate::tiers::{ResolvedTier, TierCatalog};

/// Consumption of one user in the period a policy selects at `now`.
pub(crate) async fn current_usage(
    ledger: &dyn LedgerStore,
    user_id: &UserId,
    policy: &TierPolicy,
    now: DateTime<Utc>,
) -> Result<(PeriodKey, PeriodUsage)> {
    let period_key = PeriodKey::for_instant(policy.period_type, now);
    let deltas = ledger
        .period_deltas(user_id, policy.period_type, &period_key)
        .await?;
    Ok((period_key, PeriodUsage::from_deltas(&deltas)?))
}

/// Computes balance summaries from the ledger.
#[derive(Clone)]
pub struct BalanceCalculator {
    catalog: TierCatalog,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl BalanceCalculator {
    /// Create a calculator.
    #[must_use]
    pub fn new(catalog: TierCatalog, ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            ledger,
            clock,
        }
    }

    /// Balance of `user_id` in their current period.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is missing, the tier table is
    /// malformed, or the ledger cannot be read.
    pub async fn calculate_balance(&self, user_id: &UserId) -> Result<BalanceSummary> {
        let ResolvedTier { profile, policy } = self.catalog.resolve_user(user_id).await?;
        let now = self.clock.now();
        let (period_key, usage) = current_usage(self.ledger.as_ref(), user_id, &policy, now).await?;

        let summary = BalanceSummary {
            current_period_end: period_key.period_end(policy.period_type)?,
            pending_deletion_expires: profile.pending_deletion_at(now),
            subscription_tier: profile.subscription_tier,
            period_type: policy.period_type,
            period_key,
            credits_used: usage.total,
            credits_limit: policy.credit_allotment,
            credits_remaining: policy.remaining(usage.total),
            usage_by_type: usage.by_type,
            subscription_status: profile.subscription_status,
        };

        tracing::debug!(
            user_id = %user_id,
            tier = %summary.subscription_tier,
            period_key = %summary.period_key,
            used = summary.credits_used,
            remaining = summary.credits_remaining,
            "Balance calculated"
        );

        Ok(summary)
    }
}

impl std::fmt::Debug for BalanceCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceCalculator")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
