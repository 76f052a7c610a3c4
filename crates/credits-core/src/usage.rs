//! Derived usage views: balance summaries and history pages.
//!
//! These are the shapes handed to HTTP-facing callers. Nothing here is stored.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{LedgerError, Result};
use crate::ledger::{LedgerEntry, OperationType, PeriodDelta};
use crate::period::{PeriodKey, PeriodType};
use crate::profile::SubscriptionStatus;

/// Credits consumed per operation type within one period.
///
/// Known operation types get a field; everything else is summed into `other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageByType {
    /// Match analyses.
    #[serde(rename = "match")]
    pub match_: i64,
    /// Cover letters.
    pub cover_letter: i64,
    /// Application answers.
    pub answer: i64,
    /// Outreach messages.
    pub outreach: i64,
    /// Resume parses.
    pub resume_parse: i64,
    /// Referral bonuses (negative when credits were granted).
    pub referral_bonus: i64,
    /// Every operation type without a dedicated field.
    pub other: i64,
}

impl UsageByType {
    /// Add `credits` to the bucket for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CreditOverflow`] if the bucket would overflow.
    pub fn add(&mut self, operation: &OperationType, credits: i64) -> Result<()> {
        let bucket = match operation {
            OperationType::Match => &mut self.match_,
            OperationType::CoverLetter => &mut self.cover_letter,
            OperationType::Answer => &mut self.answer,
            OperationType::Outreach => &mut self.outreach,
            OperationType::ResumeParse => &mut self.resume_parse,
            OperationType::ReferralBonus => &mut self.referral_bonus,
            OperationType::ExtractJob | OperationType::Coach | OperationType::Other(_) => {
                &mut self.other
            }
        };
        *bucket = bucket
            .checked_add(credits)
            .ok_or(LedgerError::CreditOverflow)?;
        Ok(())
    }

    /// Sum of all buckets, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<i64> {
        [
            self.cover_letter,
            self.answer,
            self.outreach,
            self.resume_parse,
            self.referral_bonus,
            self.other,
        ]
        .into_iter()
        .try_fold(self.match_, i64::checked_add)
    }
}

/// Aggregate of one accounting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodUsage {
    /// Sum of every delta in the period.
    pub total: i64,
    /// Per-type breakdown of the same deltas.
    pub by_type: UsageByType,
}

impl PeriodUsage {
    /// Fold period deltas into a total and a breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CreditOverflow`] if the total or any bucket
    /// leaves the `i64` range.
    pub fn from_deltas<'a>(deltas: impl IntoIterator<Item = &'a PeriodDelta>) -> Result<Self> {
        deltas.into_iter().try_fold(Self::default(), |mut acc, delta| {
            acc.total = acc
                .total
                .checked_add(delta.credit_delta)
                .ok_or(LedgerError::CreditOverflow)?;
            acc.by_type.add(&delta.operation_type, delta.credit_delta)?;
            Ok(acc)
        })
    }
}

/// Point-in-time balance of a user in their current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Tier name as stored on the profile (even if it fell back to free).
    pub subscription_tier: String,
    /// Period type of the resolved policy.
    pub period_type: PeriodType,
    /// Current period key.
    pub period_key: PeriodKey,
    /// Net credits used in the period (negative when bonuses dominate).
    pub credits_used: i64,
    /// Allotment; `-1` for unlimited.
    pub credits_limit: i64,
    /// `credits_limit - credits_used`, unclamped; `-1` for unlimited.
    pub credits_remaining: i64,
    /// Per-type breakdown.
    pub usage_by_type: UsageByType,
    /// Pass-through subscription status.
    pub subscription_status: SubscriptionStatus,
    /// Last second of the current period; `None` for lifetime periods.
    #[serde(serialize_with = "serialize_rfc3339_opt")]
    pub current_period_end: Option<DateTime<Utc>>,
    /// Pending account-deletion expiry, only while it has not passed.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_rfc3339_opt"
    )]
    pub pending_deletion_expires: Option<DateTime<Utc>>,
}

/// Writes instants as `2026-02-28T23:59:59+00:00`.
#[allow(clippy::ref_option)]
fn serialize_rfc3339_opt<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(instant) => {
            serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }
        None => serializer.serialize_none(),
    }
}

/// One page of a user's ledger, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageHistory {
    /// Entries on this page.
    pub items: Vec<LedgerEntry>,
    /// Total number of entries the user owns.
    pub total: u64,
    /// 1-indexed page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn delta(op: &str, credits: i64) -> PeriodDelta {
        PeriodDelta {
            operation_type: OperationType::from(op),
            credit_delta: credits,
        }
    }

    #[test]
    fn unknown_types_count_toward_total_and_other() {
        let deltas = [delta("match", 2), delta("coach", 1), delta("brand_new", 3)];
        let usage = PeriodUsage::from_deltas(&deltas).unwrap();

        assert_eq!(usage.total, 6);
        assert_eq!(usage.by_type.match_, 2);
        assert_eq!(usage.by_type.other, 4);
        assert_eq!(usage.by_type.total(), Some(usage.total));
    }

    #[test]
    fn bonuses_can_drive_total_negative() {
        let deltas = [delta("answer", 1), delta("referral_bonus", -5)];
        let usage = PeriodUsage::from_deltas(&deltas).unwrap();

        assert_eq!(usage.total, -4);
        assert_eq!(usage.by_type.referral_bonus, -5);
    }

    #[test]
    fn overflowing_period_is_an_error() {
        let deltas = [delta("match", i64::MAX), delta("answer", 1)];
        assert_eq!(
            PeriodUsage::from_deltas(&deltas),
            Err(LedgerError::CreditOverflow)
        );

        let deltas = [delta("match", i64::MAX), delta("match", 1)];
        assert_eq!(
            PeriodUsage::from_deltas(&deltas),
            Err(LedgerError::CreditOverflow)
        );
    }

    #[test]
    fn summary_serializes_response_shape() {
        let summary = BalanceSummary {
            subscription_tier: "pro".into(),
            period_type: PeriodType::Monthly,
            period_key: PeriodKey::from_raw("2026-02"),
            credits_used: 45,
            credits_limit: 100,
            credits_remaining: 55,
            usage_by_type: UsageByType {
                match_: 45,
                ..UsageByType::default()
            },
            subscription_status: SubscriptionStatus::Active,
            current_period_end: Some(Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap()),
            pending_deletion_expires: None,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["period_type"], "monthly");
        assert_eq!(json["period_key"], "2026-02");
        assert_eq!(json["usage_by_type"]["match"], 45);
        assert_eq!(json["subscription_status"], "active");
        assert_eq!(json["current_period_end"], "2026-02-28T23:59:59+00:00");
        assert!(json.get("pending_deletion_expires").is_none());
    }

    #[test]
    fn lifetime_summary_has_null_period_end() {
        let summary = BalanceSummary {
            subscription_tier: "free".into(),
            period_type: PeriodType::Lifetime,
            period_key: PeriodKey::lifetime(),
            credits_used: 0,
            credits_limit: 5,
            credits_remaining: 5,
            usage_by_type: UsageByType::default(),
            subscription_status: SubscriptionStatus::Active,
            current_period_end: None,
            pending_deletion_expires: None,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["current_period_end"].is_null());
    }
}
