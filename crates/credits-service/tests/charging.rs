//! Gate, reservation and charge-on-success integration tests.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use common::TestHarness;
use futures::future::join_all;

use credits_core::{OperationType, PeriodType};
use credits_service::AccountingError;

#[derive(Debug, thiserror::Error)]
enum GenerationError {
    #[error(transparent)]
    Accounting(#[from] AccountingError),
    #[error("provider unavailable")]
    ProviderUnavailable,
}

// ============================================================================
// Charge on success
// ============================================================================

#[tokio::test]
async fn failed_operation_charges_nothing() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");

    let result: Result<String, GenerationError> = harness
        .accounting
        .run_metered(&user_id, OperationType::CoverLetter, 1, || async {
            Err(GenerationError::ProviderUnavailable)
        })
        .await;

    assert!(matches!(result, Err(GenerationError::ProviderUnavailable)));
    assert!(harness.entries(&user_id).is_empty());
    assert_eq!(harness.accounting.gate().pending(&user_id), 0);
}

#[tokio::test]
async fn successful_operation_charges_declared_cost() {
    let harness = TestHarness::new();
    let user_id = harness.user("pro");

    let letter = harness
        .accounting
        .run_metered(&user_id, OperationType::CoverLetter, 2, || async {
            Ok::<_, GenerationError>(("Dear hiring manager".to_string(), Some("gemini".into())))
        })
        .await
        .unwrap();
    assert_eq!(letter, "Dear hiring manager");

    let entries = harness.entries(&user_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].credit_delta, 2);
    assert_eq!(entries[0].operation_type, OperationType::CoverLetter);
    assert_eq!(entries[0].provider.as_deref(), Some("gemini"));
    assert_eq!(harness.accounting.gate().pending(&user_id), 0);
}

#[tokio::test]
async fn exhausted_user_never_starts_work() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 5).await;

    let ran = AtomicBool::new(false);
    let ran_ref = &ran;
    let result = harness
        .accounting
        .run_metered(&user_id, OperationType::Match, 1, || async move {
            ran_ref.store(true, Ordering::SeqCst);
            Ok::<_, GenerationError>(((), None))
        })
        .await;

    assert!(matches!(
        result,
        Err(GenerationError::Accounting(AccountingError::InsufficientCredits {
            remaining: 0,
            required: 1
        }))
    ));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(harness.entries(&user_id).len(), 5);
}

#[tokio::test]
async fn dropped_reservation_writes_nothing() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");

    let reservation = harness.accounting.reserve(&user_id, 4).await.unwrap();
    assert_eq!(reservation.cost(), 4);
    assert_eq!(harness.accounting.gate().pending(&user_id), 4);
    drop(reservation);

    assert_eq!(harness.accounting.gate().pending(&user_id), 0);
    assert!(harness.entries(&user_id).is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

const CONCURRENT_REQUESTS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reservations_admit_exactly_one_for_last_credit() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 4).await;

    let handles = (0..CONCURRENT_REQUESTS).map(|_| {
        let accounting = harness.accounting.clone();
        tokio::spawn(async move { accounting.reserve(&user_id, 1).await })
    });
    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let (admitted, rejected): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(Result::is_ok);
    assert_eq!(admitted.len(), 1);
    assert_eq!(rejected.len(), CONCURRENT_REQUESTS - 1);
    assert!(rejected.iter().all(|r| matches!(
        r,
        Err(AccountingError::InsufficientCredits { remaining: 0, .. })
    )));

    for reservation in admitted {
        reservation
            .unwrap()
            .commit(OperationType::Match, Some("claude"))
            .await
            .unwrap();
    }

    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_used, 5);
    assert_eq!(summary.credits_remaining, 0);
    assert_eq!(harness.accounting.gate().pending(&user_id), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn plain_credit_check_admits_every_concurrent_caller() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");
    harness.record_many(&user_id, OperationType::Match, 1, 4).await;

    let checks = (0..CONCURRENT_REQUESTS).map(|_| harness.accounting.has_credits(&user_id));
    let results = join_all(checks).await;
    assert!(results.into_iter().all(|r| r.unwrap()));

    // Each admitted caller then records: the documented over-consumption.
    harness
        .record_many(&user_id, OperationType::Match, 1, CONCURRENT_REQUESTS)
        .await;
    let summary = harness.accounting.calculate_balance(&user_id).await.unwrap();
    assert_eq!(summary.credits_remaining, 1 - CONCURRENT_REQUESTS as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reservations_for_different_users_are_independent() {
    let harness = TestHarness::new();
    let users: Vec<_> = (0..8).map(|_| harness.user("free")).collect();

    let handles = users.iter().map(|user_id| {
        let accounting = harness.accounting.clone();
        let user_id = *user_id;
        tokio::spawn(async move { accounting.reserve(&user_id, 5).await })
    });
    let outcomes = join_all(handles).await;
    assert!(outcomes.iter().all(|o| matches!(o, Ok(Ok(_)))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unlimited_reservations_are_always_admitted() {
    let harness = TestHarness::new();
    let user_id = harness.user("unlimited");
    harness.record_many(&user_id, OperationType::Answer, 1_000, 3).await;

    let handles = (0..CONCURRENT_REQUESTS).map(|_| {
        let accounting = harness.accounting.clone();
        tokio::spawn(async move { accounting.reserve(&user_id, 50).await })
    });
    let outcomes = join_all(handles).await;
    assert!(outcomes.iter().all(|o| matches!(o, Ok(Ok(_)))));
}

// ============================================================================
// Tier changes
// ============================================================================

#[tokio::test]
async fn commit_stamps_tier_current_at_commit_time() {
    let harness = TestHarness::new();
    let user_id = harness.user("free");

    let reservation = harness.accounting.reserve(&user_id, 1).await.unwrap();
    harness.set_tier(user_id, "pro");
    let entry = reservation
        .commit(OperationType::Outreach, Some("claude"))
        .await
        .unwrap();

    assert_eq!(entry.period_type, PeriodType::Monthly);
    assert_eq!(entry.period_key.as_str(), "2026-02");
}
