//! Core types for the usage credit ledger.
//!
//! This crate provides the values shared by the store and service crates:
//!
//! - **Identifiers**: `UserId`, `EntryId`
//! - **Periods**: `PeriodType`, `PeriodKey`
//! - **Tiers**: `TierPolicy`, `TierTable`
//! - **Ledger**: `LedgerEntry`, `OperationType`, `PeriodDelta`
//! - **Profiles**: `UserProfile`, `SubscriptionStatus`
//! - **Views**: `BalanceSummary`, `UsageByType`, `UsageHistory`
//!
//! # Credits
//!
//! Credits are whole numbers. A consuming operation normally costs 1, a
//! rate-limited free operation costs 0, and bonuses are written as negative
//! deltas. `-1` as an allotment or remaining balance means unlimited.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod ledger;
pub mod period;
pub mod profile;
pub mod tier;
pub mod usage;

pub use error::{LedgerError, Result};
pub use ids::{EntryId, IdError, UserId};
pub use ledger::{LedgerEntry, OperationType, PeriodDelta, MAX_CREDIT_DELTA, SYSTEM_PROVIDER};
pub use period::{PeriodKey, PeriodType, LIFETIME_KEY};
pub use profile::{SubscriptionStatus, UserProfile};
pub use tier::{
    TierPolicy, TierTable, DEFAULT_MAX_RESUMES, DEFAULT_REFERRAL_BONUS, FREE_TIER,
    REFERRAL_BONUS_KEY, TIER_LIMITS_KEY, UNLIMITED_CREDITS,
};
pub use usage::{BalanceSummary, PeriodUsage, UsageByType, UsageHistory};
