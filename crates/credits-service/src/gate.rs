//! Credit gate: admission checks before a credit-consuming operation.
//!
//! Two admission paths exist:
//!
//! - [`CreditGate::has_credits`] is a plain read. Concurrent callers can all
//!   pass it before any of them records usage, over-consuming by up to N-1
//!   credits for N in-flight requests.
//! - [`CreditGate::reserve`] serializes admissions per user inside this
//!   process and counts in-flight reservations against the balance, so N
//!   concurrent reservations against one remaining credit admit exactly one.
//!
//! Reservations are never persisted. The ledger stays the only record of
//! consumption; a pending amount disappears when its reservation is committed
//! (after the entry is appended) or dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use credits_core::{LedgerEntry, OperationType, UserId, MAX_CREDIT_DELTA};
use credits_store::LedgerStore;

use crate::balance::current_usage;
use crate::clock::Clock;
use crate::error::{AccountingError, Result};
use crate::recorder::UsageRecorder;
use crate::tiers::TierCatalog;

/// In-flight reservations and per-user admission locks.
#[derive(Debug, Default)]
struct ReservationBook {
    locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
    pending: Mutex<HashMap<UserId, i64>>,
}

impl ReservationBook {
    fn user_lock(&self, user_id: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*user_id)
            .or_default()
            .clone()
    }

    /// Forget the user's lock once nobody else holds it.
    fn prune(&self, user_id: &UserId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(user_id);
        }
    }

    fn pending(&self, user_id: &UserId) -> i64 {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    fn hold(&self, user_id: &UserId, cost: i64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let amount = pending.entry(*user_id).or_default();
        *amount = amount.saturating_add(cost);
    }

    fn release(&self, user_id: &UserId, cost: i64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(amount) = pending.get_mut(user_id) {
            *amount -= cost;
            if *amount <= 0 {
                pending.remove(user_id);
            }
        }
    }
}

/// Admission checks against the user's current balance.
#[derive(Clone)]
pub struct CreditGate {
    catalog: TierCatalog,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    recorder: UsageRecorder,
    book: Arc<ReservationBook>,
}

impl CreditGate {
    /// Create a gate. Clones share one reservation book.
    #[must_use]
    pub fn new(catalog: TierCatalog, ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        let recorder = UsageRecorder::new(catalog.clone(), ledger.clone(), clock.clone());
        Self {
            catalog,
            ledger,
            clock,
            recorder,
            book: Arc::default(),
        }
    }

    /// Whether the user has at least one credit left in the current period.
    ///
    /// Unlimited tiers always pass. This is a check without a hold: see the
    /// module docs for the race it leaves open.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is missing, the tier table is
    /// malformed, or the ledger cannot be read.
    pub async fn has_credits(&self, user_id: &UserId) -> Result<bool> {
        let policy = self.catalog.resolve_user(user_id).await?.policy;
        if policy.is_unlimited() {
            return Ok(true);
        }

        let (_, usage) =
            current_usage(self.ledger.as_ref(), user_id, &policy, self.clock.now()).await?;
        let allowed = policy.remaining(usage.total) > 0;

        tracing::debug!(
            user_id = %user_id,
            used = usage.total,
            allotment = policy.credit_allotment,
            allowed,
            "Credit check"
        );
        Ok(allowed)
    }

    /// Claim `cost` credits for an operation about to run.
    ///
    /// Admits iff the balance left after other in-flight reservations is
    /// positive and covers `cost`. Unlimited tiers are always admitted.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::InsufficientCredits`] when rejected,
    /// [`AccountingError::InvalidCost`] for a cost outside
    /// `0..=MAX_CREDIT_DELTA`, or any error of the underlying lookups.
    pub async fn reserve(&self, user_id: &UserId, cost: i64) -> Result<Reservation> {
        if !(0..=MAX_CREDIT_DELTA).contains(&cost) {
            return Err(AccountingError::InvalidCost(cost));
        }

        let lock = self.book.user_lock(user_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.admit(user_id, cost).await
        };
        drop(lock);
        self.book.prune(user_id);
        outcome
    }

    async fn admit(&self, user_id: &UserId, cost: i64) -> Result<Reservation> {
        let policy = self.catalog.resolve_user(user_id).await?.policy;

        if !policy.is_unlimited() {
            let (_, usage) =
                current_usage(self.ledger.as_ref(), user_id, &policy, self.clock.now()).await?;
            let remaining = policy
                .remaining(usage.total)
                .saturating_sub(self.book.pending(user_id));
            if remaining <= 0 || remaining < cost {
                tracing::info!(
                    user_id = %user_id,
                    remaining,
                    required = cost,
                    "Reservation rejected"
                );
                return Err(AccountingError::InsufficientCredits {
                    remaining,
                    required: cost,
                });
            }
        }

        self.book.hold(user_id, cost);
        tracing::debug!(user_id = %user_id, cost, "Credits reserved");

        Ok(Reservation {
            user_id: *user_id,
            cost,
            recorder: self.recorder.clone(),
            book: Arc::clone(&self.book),
        })
    }

    /// Credits currently held by uncommitted reservations of a user.
    #[must_use]
    pub fn pending(&self, user_id: &UserId) -> i64 {
        self.book.pending(user_id)
    }

    /// Reserve, run `work`, and charge only if it succeeds.
    ///
    /// `work` resolves to its output and the provider that served it. On
    /// failure the reservation is released and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the work's own error, or an accounting error (converted into
    /// `E`) if the reservation or the final append fails.
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
        let reservation = self.reserve(user_id, cost).await?;

        match work().await {
            Ok((output, provider)) => {
                reservation.commit(operation, provider.as_deref()).await?;
                Ok(output)
            }
            Err(e) => {
                tracing::debug!(
                    user_id = %user_id,
                    operation = %operation,
                    "Metered operation failed, nothing charged"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for CreditGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditGate")
            .field("book", &self.book)
            .finish_non_exhaustive()
    }
}

/// Credits held for an operation in flight.
///
/// Dropping a reservation without committing releases the hold and writes
/// nothing.
#[must_use = "a reservation is released without charging when dropped"]
pub struct Reservation {
    user_id: UserId,
    cost: i64,
    recorder: UsageRecorder,
    book: Arc<ReservationBook>,
}

impl Reservation {
    /// User the credits are held for.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Credits held.
    #[must_use]
    pub const fn cost(&self) -> i64 {
        self.cost
    }

    /// Charge the held credits. The hold is released after the entry is
    /// appended, so the credits are never counted as free in between.
    ///
    /// # Errors
    ///
    /// Returns an error if recording fails; the hold is released either way.
    pub async fn commit(
        self,
        operation: OperationType,
        provider: Option<&str>,
    ) -> Result<LedgerEntry> {
        self.recorder
            .record_usage(&self.user_id, operation, provider, self.cost)
            .await
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.book.release(&self.user_id, self.cost);
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("user_id", &self.user_id)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
