//! Tier catalog: tier policies, profile resolution and the referral bonus amount.
//!
//! Every accessor reads through to the configuration store. There is no
//! process-wide cache, so an administrator's edit is visible on the next call.

use std::sync::Arc;

use credits_core::{
    TierPolicy, TierTable, UserId, UserProfile, DEFAULT_REFERRAL_BONUS, REFERRAL_BONUS_KEY,
    TIER_LIMITS_KEY,
};
use credits_store::{ConfigStore, ProfileStore};

use crate::error::{AccountingError, Result};

/// A user's profile together with the policy their tier resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTier {
    /// The profile as stored.
    pub profile: UserProfile,
    /// Policy of `profile.subscription_tier`, or `free` if unknown.
    pub policy: TierPolicy,
}

/// Read-through accessor for tier configuration.
#[derive(Clone)]
pub struct TierCatalog {
    config: Arc<dyn ConfigStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl TierCatalog {
    /// Create a catalog over the given collaborators.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { config, profiles }
    }

    /// Current tier table.
    ///
    /// An absent key yields the built-in table (with a warning). A present
    /// but undecodable value is a configuration error: silently substituting
    /// defaults could hand out credits nobody configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the stored table is malformed.
    pub async fn get_tier_table(&self) -> Result<TierTable> {
        match self.config.get_config(TIER_LIMITS_KEY).await? {
            None | Some(serde_json::Value::Null) => {
                tracing::warn!(key = TIER_LIMITS_KEY, "Tier limits not configured, using defaults");
                Ok(TierTable::default())
            }
            Some(value) => serde_json::from_value(value).map_err(|e| {
                AccountingError::Configuration(format!("malformed {TIER_LIMITS_KEY}: {e}"))
            }),
        }
    }

    /// Policy for `tier_name`; unknown names get the `free` policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier table cannot be read.
    pub async fn get_tier_policy(&self, tier_name: &str) -> Result<TierPolicy> {
        let table = self.get_tier_table().await?;
        if table.get(tier_name).is_none() {
            tracing::debug!(tier = %tier_name, "Unknown tier, applying free policy");
        }
        Ok(table.resolve(tier_name))
    }

    /// Fetch a profile, failing if the user has none.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::ProfileNotFound`] for unknown users.
    pub async fn profile(&self, user_id: &UserId) -> Result<UserProfile> {
        self.profiles
            .get_profile(user_id)
            .await?
            .ok_or(AccountingError::ProfileNotFound(*user_id))
    }

    /// Profile plus the policy of the tier it currently names.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is missing or the tier table is unreadable.
    pub async fn resolve_user(&self, user_id: &UserId) -> Result<ResolvedTier> {
        let profile = self.profile(user_id).await?;
        let policy = self.get_tier_policy(&profile.subscription_tier).await?;
        Ok(ResolvedTier { profile, policy })
    }

    /// Resume cap of the user's tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is missing or the tier table is unreadable.
    pub async fn max_resumes(&self, user_id: &UserId) -> Result<u32> {
        Ok(self.resolve_user(user_id).await?.policy.max_resumes)
    }

    /// Credits granted per referral.
    ///
    /// Falls back to the default on any failure to read the value; a missing
    /// bonus setting never blocks a referral.
    pub async fn referral_bonus_amount(&self) -> i64 {
        let value = match self.config.get_config(REFERRAL_BONUS_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return DEFAULT_REFERRAL_BONUS,
            Err(e) => {
                tracing::warn!(error = %e, key = REFERRAL_BONUS_KEY, "Config read failed, using default bonus");
                return DEFAULT_REFERRAL_BONUS;
            }
        };

        let amount = match &value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        amount.unwrap_or_else(|| {
            tracing::warn!(value = %value, key = REFERRAL_BONUS_KEY, "Unreadable bonus amount, using default");
            DEFAULT_REFERRAL_BONUS
        })
    }
}

impl std::fmt::Debug for TierCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierCatalog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credits_core::PeriodType;
    use credits_store::MemoryStore;
    use serde_json::json;

    fn catalog() -> (TierCatalog, MemoryStore) {
        let store = MemoryStore::new();
        let shared = Arc::new(store.clone());
        (TierCatalog::new(shared.clone(), shared), store)
    }

    #[tokio::test]
    async fn missing_table_uses_defaults() {
        let (catalog, _) = catalog();
        assert_eq!(catalog.get_tier_policy("pro").await.unwrap(), TierPolicy::PRO);
        assert_eq!(catalog.get_tier_policy("free").await.unwrap(), TierPolicy::FREE);
    }

    #[tokio::test]
    async fn configured_table_is_read_every_call() {
        let (catalog, store) = catalog();
        store.put_config(
            TIER_LIMITS_KEY,
            json!({
                "free": {"type": "lifetime", "credits": 3},
                "pro": {"type": "monthly", "credits": 250, "max_resumes": 20}
            }),
        );
        let pro = catalog.get_tier_policy("pro").await.unwrap();
        assert_eq!(pro.credit_allotment, 250);
        assert_eq!(pro.max_resumes, 20);

        store.put_config(
            TIER_LIMITS_KEY,
            json!({"pro": {"type": "monthly", "credits": 300}}),
        );
        assert_eq!(
            catalog.get_tier_policy("pro").await.unwrap().credit_allotment,
            300
        );
    }

    #[tokio::test]
    async fn unknown_tier_falls_back_to_free() {
        let (catalog, store) = catalog();
        assert_eq!(catalog.get_tier_policy("bogus").await.unwrap(), TierPolicy::FREE);

        store.put_config(
            TIER_LIMITS_KEY,
            json!({"free": {"type": "lifetime", "credits": 2}}),
        );
        let policy = catalog.get_tier_policy("bogus").await.unwrap();
        assert_eq!(policy.period_type, PeriodType::Lifetime);
        assert_eq!(policy.credit_allotment, 2);
    }

    #[tokio::test]
    async fn malformed_table_is_an_error() {
        let (catalog, store) = catalog();
        store.put_config(TIER_LIMITS_KEY, json!({"pro": {"type": "weekly", "credits": 1}}));
        let err = catalog.get_tier_policy("pro").await.unwrap_err();
        assert!(matches!(err, AccountingError::Configuration(_)));
    }

    #[tokio::test]
    async fn referral_amount_sources() {
        let (catalog, store) = catalog();
        assert_eq!(catalog.referral_bonus_amount().await, DEFAULT_REFERRAL_BONUS);

        store.put_config(REFERRAL_BONUS_KEY, json!(10));
        assert_eq!(catalog.referral_bonus_amount().await, 10);

        store.put_config(REFERRAL_BONUS_KEY, json!("12"));
        assert_eq!(catalog.referral_bonus_amount().await, 12);

        store.put_config(REFERRAL_BONUS_KEY, json!({"credits": 8}));
        assert_eq!(catalog.referral_bonus_amount().await, DEFAULT_REFERRAL_BONUS);
    }

    #[tokio::test]
    async fn profile_lookup() {
        let (catalog, store) = catalog();
        let user_id = UserId::generate();
        assert!(matches!(
            catalog.resolve_user(&user_id).await,
            Err(AccountingError::ProfileNotFound(id)) if id == user_id
        ));

        store.put_profile(UserProfile::new(user_id, "unlimited"));
        assert_eq!(catalog.max_resumes(&user_id).await.unwrap(), 25);
    }
}
