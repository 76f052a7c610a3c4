//! User profile data read by the accounting logic.
//!
//! Profiles are owned by the authentication and billing collaborators; this
//! crate only reads them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::FREE_TIER;
use crate::UserId;

/// The subset of a user profile the accounting logic depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Profile owner.
    pub user_id: UserId,

    /// Current subscription tier name (not validated here).
    #[serde(default = "default_tier")]
    pub subscription_tier: String,

    /// Billing status, passed through to balance summaries.
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,

    /// Expiry of a pending account-deletion confirmation, if any.
    #[serde(default)]
    pub deletion_token_expires: Option<DateTime<Utc>>,
}

fn default_tier() -> String {
    FREE_TIER.to_string()
}

impl UserProfile {
    /// Create an active profile on the given tier.
    #[must_use]
    pub fn new(user_id: UserId, subscription_tier: impl Into<String>) -> Self {
        Self {
            user_id,
            subscription_tier: subscription_tier.into(),
            subscription_status: SubscriptionStatus::Active,
            deletion_token_expires: None,
        }
    }

    /// Set the subscription status.
    #[must_use]
    pub fn with_status(mut self, status: SubscriptionStatus) -> Self {
        self.subscription_status = status;
        self
    }

    /// Set the pending-deletion expiry.
    #[must_use]
    pub fn with_deletion_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.deletion_token_expires = Some(expires);
        self
    }

    /// The pending-deletion expiry, if one is set and has not passed at `now`.
    #[must_use]
    pub fn pending_deletion_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.deletion_token_expires.filter(|expires| now <= *expires)
    }
}

/// Status of the user's subscription as reported by the billing provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    /// Subscription is active (also the status of free users).
    #[default]
    Active,
    /// Subscription was canceled.
    Canceled,
    /// Payment failed.
    PastDue,
    /// Trial period.
    Trialing,
    /// Any status the billing provider reports that is not listed above.
    Other(String),
}

impl SubscriptionStatus {
    /// Get the status as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Trialing => "trialing",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => Self::Active,
            "canceled" => Self::Canceled,
            "past_due" => Self::PastDue,
            "trialing" => Self::Trialing,
            _ => Self::Other(value),
        }
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}
