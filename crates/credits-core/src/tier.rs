//! Subscription tier policies.
//!
//! The tier table lives in configuration storage under [`TIER_LIMITS_KEY`] and
//! is owned by an administrative process. This module only models and
//! resolves it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

// ============================================================================
// Constants
// ============================================================================

/// Configuration key holding the tier table.
pub const TIER_LIMITS_KEY: &str = "tier_limits";

/// Configuration key holding the referral bonus amount.
pub const REFERRAL_BONUS_KEY: &str = "referral_bonus_credits";

/// Referral bonus used when none is configured.
pub const DEFAULT_REFERRAL_BONUS: i64 = 5;

/// Allotment sentinel meaning "no cap".
pub const UNLIMITED_CREDITS: i64 = -1;

/// Tier every unknown tier name falls back to.
pub const FREE_TIER: &str = "free";

/// Resume cap applied when a stored policy omits one.
pub const DEFAULT_MAX_RESUMES: u32 = 5;

/// Accounting policy for one subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Whether the allotment resets monthly or never.
    #[serde(rename = "type")]
    pub period_type: PeriodType,

    /// Credits granted per period; [`UNLIMITED_CREDITS`] for no cap.
    #[serde(rename = "credits")]
    pub credit_allotment: i64,

    /// Maximum number of stored resumes.
    #[serde(default = "default_max_resumes")]
    pub max_resumes: u32,
}

const fn default_max_resumes() -> u32 {
    DEFAULT_MAX_RESUMES
}

impl TierPolicy {
    /// Lifetime tier with 5 credits and 5 resumes.
    pub const FREE: Self = Self {
        period_type: PeriodType::Lifetime,
        credit_allotment: 5,
        max_resumes: 5,
    };

    /// Monthly tier with 100 credits and 10 resumes.
    pub const PRO: Self = Self {
        period_type: PeriodType::Monthly,
        credit_allotment: 100,
        max_resumes: 10,
    };

    /// Monthly tier without a credit cap and 25 resumes.
    pub const UNLIMITED: Self = Self {
        period_type: PeriodType::Monthly,
        credit_allotment: UNLIMITED_CREDITS,
        max_resumes: 25,
    };

    /// Whether this policy carries the unlimited sentinel.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.credit_allotment == UNLIMITED_CREDITS
    }

    /// Remaining credits after `used`, or [`UNLIMITED_CREDITS`] for unlimited tiers.
    ///
    /// The result is not clamped: over-consumption shows up as a negative value.
    /// It saturates at the `i64` bounds.
    #[must_use]
    pub const fn remaining(&self, used: i64) -> i64 {
        if self.is_unlimited() {
            UNLIMITED_CREDITS
        } else {
            self.credit_allotment.saturating_sub(used)
        }
    }
}

/// Mapping from tier name to policy, as stored under [`TIER_LIMITS_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable(HashMap<String, TierPolicy>);

impl TierTable {
    /// Build a table from explicit entries.
    pub fn new(entries: impl IntoIterator<Item = (String, TierPolicy)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Look up a tier by exact name.
    #[must_use]
    pub fn get(&self, tier_name: &str) -> Option<&TierPolicy> {
        self.0.get(tier_name)
    }

    /// Resolve a tier name, falling back to the free policy for unknown names.
    ///
    /// If the table has no `free` entry either, the built-in free policy is
    /// used, so an unknown name can never resolve to more than the free grant.
    #[must_use]
    pub fn resolve(&self, tier_name: &str) -> TierPolicy {
        self.get(tier_name)
            .or_else(|| self.get(FREE_TIER))
            .copied()
            .unwrap_or(TierPolicy::FREE)
    }

    /// Number of tiers in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TierTable {
    /// The built-in table used when configuration has not been bootstrapped.
    fn default() -> Self {
        Self::new([
            (FREE_TIER.to_string(), TierPolicy::FREE),
            ("pro".to_string(), TierPolicy::PRO),
            ("unlimited".to_string(), TierPolicy::UNLIMITED),
        ])
    }
}
