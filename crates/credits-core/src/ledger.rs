//! Ledger entries.
//!
//! The ledger is append-only. Balances are never stored; they are derived by
//! summing `credit_delta` over the entries of one accounting period.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::period::{PeriodKey, PeriodType};
use crate::{EntryId, UserId};

/// Provider recorded on entries written by the accounting system itself.
pub const SYSTEM_PROVIDER: &str = "system";

/// Largest credit amount a single entry may carry, in either direction.
///
/// Keeps period sums far away from `i64` overflow.
pub const MAX_CREDIT_DELTA: i64 = 1_000_000_000;

/// The kind of operation an entry accounts for.
///
/// Unknown names parse into [`OperationType::Other`] so entries written by
/// newer callers still aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    /// Resume/job match analysis.
    Match,
    /// Cover letter generation.
    CoverLetter,
    /// Application question answer.
    Answer,
    /// Outreach message generation.
    Outreach,
    /// Resume parsing.
    ResumeParse,
    /// Referral bonus credit.
    ReferralBonus,
    /// LLM-assisted job extraction (rate limited, free).
    ExtractJob,
    /// Interview coaching.
    Coach,
    /// Any other operation name.
    Other(String),
}

impl OperationType {
    /// Get the operation name as stored in the ledger.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Match => "match",
            Self::CoverLetter => "cover_letter",
            Self::Answer => "answer",
            Self::Outreach => "outreach",
            Self::ResumeParse => "resume_parse",
            Self::ReferralBonus => "referral_bonus",
            Self::ExtractJob => "extract_job",
            Self::Coach => "coach",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OperationType {
    fn from(value: &str) -> Self {
        match value {
            "match" => Self::Match,
            "cover_letter" => Self::CoverLetter,
            "answer" => Self::Answer,
            "outreach" => Self::Outreach,
            "resume_parse" => Self::ResumeParse,
            "referral_bonus" => Self::ReferralBonus,
            "extract_job" => Self::ExtractJob,
            "coach" => Self::Coach,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<OperationType> for String {
    fn from(op: OperationType) -> Self {
        match op {
            OperationType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for OperationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// One immutable credit-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Time-ordered entry id.
    pub id: EntryId,

    /// Owner of the entry.
    pub user_id: UserId,

    /// What the credits were spent on (or granted for).
    pub operation_type: OperationType,

    /// Which LLM provider served the request, or `"system"`.
    pub provider: Option<String>,

    /// Positive = consumption, negative = bonus, zero = free but counted.
    pub credit_delta: i64,

    /// Period type of the policy in force when the entry was written.
    pub period_type: PeriodType,

    /// Period the entry belongs to.
    pub period_key: PeriodKey,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry for an operation performed at `created_at`.
    ///
    /// The period key is derived from `period_type` and `created_at`.
    #[must_use]
    pub fn new(
        user_id: UserId,
        operation_type: OperationType,
        provider: Option<String>,
        credit_delta: i64,
        period_type: PeriodType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::at(created_at),
            user_id,
            operation_type,
            provider,
            credit_delta,
            period_type,
            period_key: PeriodKey::for_instant(period_type, created_at),
            created_at,
        }
    }

    /// Create a lifetime-scoped bonus entry crediting `amount` to the user.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CreditOutOfRange`] if `amount` has no negation.
    pub fn referral_bonus(
        user_id: UserId,
        amount: i64,
        created_at: DateTime<Utc>,
    ) -> crate::Result<Self> {
        let delta = amount
            .checked_neg()
            .ok_or(LedgerError::CreditOutOfRange(amount))?;
        Ok(Self::new(
            user_id,
            OperationType::ReferralBonus,
            Some(SYSTEM_PROVIDER.to_string()),
            delta,
            PeriodType::Lifetime,
            created_at,
        ))
    }

    /// Projection used by period aggregation.
    #[must_use]
    pub fn delta(&self) -> PeriodDelta {
        PeriodDelta {
            operation_type: self.operation_type.clone(),
            credit_delta: self.credit_delta,
        }
    }
}

/// The two columns period aggregation needs from each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDelta {
    /// Operation the entry accounts for.
    pub operation_type: OperationType,
    /// Signed credit delta.
    pub credit_delta: i64,
}
