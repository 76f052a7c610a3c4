//! Balance derivation integration tests.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::TestHarness;

use credits_core::{
    LedgerEntry, LedgerError, OperationType, PeriodType, TierPolicy, UNLIMITED_CREDITS,
};
use credits_service::AccountingError;
use credits_store::LedgerStore;

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn free_tier_starts_with_full_allotment() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");

    assert!(harness.accounting.has_credits(&user_id).await.unwrap());

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.period_type, PeriodType::Lifetime);
    assert_eq!(summary.period_key.as_str(), "lifetime");
    assert_eq!(summary.credits_used, 0);
    assert_eq!(summary.credits_limit, 5);
    assert_eq!(summary.credits_remaining, 5);
    assert_eq!(summary.current_period_end, None);
}

#[tokio::test]
async fn free_tier_exhausted_after_five_matches() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 5).await;

    assert!(!harness.accounting.has_credits(&user_id).await.unwrap());

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_used, 5);
    assert_eq!(summary.credits_remaining, 0);
    assert_eq!(summary.usage_by_type.match_, 5);
}

#[tokio::test]
async fn referral_bonus_restores_free_credits() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 5).await;

    let amount = harness
        .accounting
        .add_referral_credits(&user_id, Some(5))
        .await
        .unwrap();
    assert_eq!(amount, 5);

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_used, 0);
    assert_eq!(summary.credits_remaining, 5);
    assert_eq!(summary.usage_by_type.referral_bonus, -5);
    assert!(harness.accounting.has_credits(&user_id).await.unwrap());
}

#[tokio::test]
async fn pro_tier_monthly_balance() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");

    for credits in [10, 15, 20] {
        harness
            .accounting
            .record_usage(&user_id, OperationType::CoverLetter, Some("gpt"), credits)
            .await
            .unwrap();
    }

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.period_key.as_str(), "2026-02");
    assert_eq!(summary.credits_used, 45);
    assert_eq!(summary.credits_remaining, 55);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["current_period_end"], "2026-02-28T23:59:59+00:00");
    assert_eq!(json["period_type"], "monthly");
    assert_eq!(json["usage_by_type"]["cover_letter"], 45);
    assert!(json.get("pending_deletion_expires").is_none());
}

#[tokio::test]
async fn unlimited_tier_never_runs_out() {
    let harness = TestHarness::new();
    let user_id = harness.user("unlimited");
    harness.record_many(&user_id, OperationType::Answer, 1, 500).await;

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_used, 500);
    assert_eq!(summary.credits_limit, UNLIMITED_CREDITS);
    assert_eq!(summary.credits_remaining, UNLIMITED_CREDITS);
    assert!(harness.accounting.has_credits(&user_id).await.unwrap());
}

#[tokio::test]
async fn unknown_tier_behaves_like_free() {
    let harness = TestHarness::new();
    let bogus = harness.user("bogus");

    assert!(harness.accounting.has_credits(&bogus).await.unwrap());
    assert_eq!(
        harness.accounting.get_tier_policy("bogus").await.unwrap(),
        harness.accounting.get_tier_policy("free").await.unwrap()
    );

    let summary = harness.accounting.calculate_balance(&bogus).await.unwrap();
    assert_eq!(summary.subscription_tier, "bogus");
    assert_eq!(summary.period_key.as_str(), "lifetime");
    assert_eq!(summary.credits_used, 0);
    assert_eq!(summary.credits_limit, TierPolicy::FREE.credit_allotment);
    assert_eq!(summary.credits_remaining, 5);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn repeated_calculation_is_stable() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");
    harness.record_many(&user_id, OperationType::Outreach, 3, 4).await;
    harness
        .accounting
        .record_usage(&user_id, OperationType::from("portfolio_review"), None, 2)
        .await
        .unwrap();

    let first = harness.accounting.calculate_balance(&user_id).await.unwrap();
    let second = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.credits_used, 14);
    assert_eq!(first.usage_by_type.other, 2);
}

/// xorshift64, enough to spread deltas without another dependency.
struct Deltas(u64);

impl Iterator for Deltas {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        // -5..=10
        Some((self.0 % 16) as i64 - 5)
    }
}

#[tokio::test]
async fn credits_used_is_the_sum_of_deltas() {
    for seed in [0x9E37_79B9_7F4A_7C15_u64, 42, 7_777_777, 0xDEAD_BEEF] {
        let harness = TestHarness::new();
        let user_id = harness.user("pro");
        let operations = [
            OperationType::Match,
            OperationType::CoverLetter,
            OperationType::ResumeParse,
            OperationType::Coach,
        ];

        let mut expected = 0;
        for (i, delta) in Deltas(seed).take(60).enumerate() {
            harness
                .accounting
                .record_usage(&user_id, operations[i % operations.len()].clone(), None, delta)
                .await
                .unwrap();
            expected += delta;
        }

        let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
        assert_eq!(summary.credits_used, expected, "seed {seed:#x}");
        assert_eq!(summary.usage_by_type.total(), Some(expected), "seed {seed:#x}");
        assert_eq!(summary.credits_remaining, 100 - expected, "seed {seed:#x}");
    }
}

#[tokio::test]
async fn over_consumption_is_not_clamped() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 7).await;

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_remaining, -2);
    assert!(!harness.accounting.has_credits(&user_id).await.unwrap());
}

#[tokio::test]
async fn monthly_balance_resets_next_month() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");
    harness.record_many(&user_id, OperationType::Match, 10, 3).await;

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.period_key.as_str(), "2026-03");
    assert_eq!(summary.credits_used, 0);
    assert_eq!(summary.credits_remaining, 100);
}

// ============================================================================
// Referral bonuses
// ============================================================================

#[tokio::test]
async fn referral_bonus_stays_lifetime_on_monthly_tier() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");
    harness.record_many(&user_id, OperationType::Match, 1, 2).await;

    harness
        .accounting
        .add_referral_credits(&user_id, Some(5))
        .await
        .unwrap();

    let bonus = harness
        .entries(&user_id)
        .into_iter()
        .find(|e| e.operation_type == OperationType::ReferralBonus)
        .unwrap();
    assert_eq!(bonus.period_type, PeriodType::Lifetime);
    assert_eq!(bonus.period_key.as_str(), "lifetime");

    // Excluded from the monthly aggregate.
    let monthly = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(monthly.credits_used, 2);
    assert_eq!(monthly.usage_by_type.referral_bonus, 0);

    // Counted once the user is back on a lifetime tier.
    harness.set_tier(user_id, "free");
    let lifetime = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(lifetime.credits_used, -5);
    assert_eq!(lifetime.credits_remaining, 10);
}

#[tokio::test]
async fn referral_default_amount() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");

    let amount = harness
        .accounting
        .add_referral_credits(&user_id, None)
        .await
        .unwrap();
    assert_eq!(amount, 5);
    assert_eq!(harness.entries(&user_id)[0].credit_delta, -5);
}

#[tokio::test]
async fn pending_deletion_is_reported_until_expiry() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    let expires = common::feb_2026() + Duration::days(1);
    harness.store.put_profile(
        credits_core::UserProfile::new(user_id, "free").with_deletion_expiry(expires),
    );

    let json = serde_json::to_value(harness.accounting.calculate_balance(&user_id).await.unwrap())
        .unwrap();
    assert_eq!(json["pending_deletion_expires"], "2026-02-15T10:00:00+00:00");
    assert_eq!(json["subscription_status"], "active");

    harness.clock.advance(Duration::days(2));
    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.pending_deletion_expires, None);
}

// ============================================================================
// Credit range
// ============================================================================

#[tokio::test]
async fn out_of_range_writes_leave_balance_readable() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");

    let err = harness
        .accounting
        .record_usage(&user_id, OperationType::Match, None, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountingError::InvalidCost(i64::MAX)));
    assert_eq!(err.code(), "bad_request");

    assert!(matches!(
        harness
            .accounting
            .add_referral_credits(&user_id, Some(i64::MIN))
            .await,
        Err(AccountingError::InvalidCost(i64::MIN))
    ));

    harness
        .accounting
        .record_usage(&user_id, OperationType::Match, None, 1)
        .await
        .unwrap();

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_used, 1);
    assert_eq!(summary.credits_remaining, 99);
    assert!(harness.accounting.has_credits(&user_id).await.unwrap());
}

#[tokio::test]
async fn overflowing_ledger_reports_an_error() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");
    let now = common::feb_2026();

    for credits in [i64::MAX, 1] {
        let entry = LedgerEntry::new(
            user_id,
            OperationType::Match,
            None,
            credits,
            PeriodType::Monthly,
            now,
        );
        harness.store.append(&entry).await.unwrap();
    }

    let overflow = |result: Result<_, AccountingError>| {
        matches!(
            result,
            Err(AccountingError::Ledger(LedgerError::CreditOverflow))
        )
    };
    assert!(overflow(
        harness.accounting.calculate_balance(&user_id).await.map(|_| ())
    ));
    assert!(overflow(
        harness.accounting.has_credits(&user_id).await.map(|_| ())
    ));
    assert!(overflow(
        harness.accounting.reserve(&user_id, 1).await.map(|_| ())
    ));
}
