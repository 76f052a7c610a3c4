//! PostgreSQL storage implementation.
//!
//! Table layout (see `migrations/`):
//!
//! - `usage_events`: one row per ledger entry, insert-only
//! - `global_config`: `key -> JSONB value`
//! - `profiles`: subscription tier/status and the pending-deletion expiry
//!
//! Appends are plain `INSERT`s, so concurrent writers for the same user never
//! contend on a shared row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use credits_core::{
    LedgerEntry, OperationType, PeriodDelta, PeriodKey, PeriodType, SubscriptionStatus, UserId,
    UserProfile,
};

use crate::error::{Result, StoreError};
use crate::{ConfigStore, LedgerStore, ProfileStore};

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Ledger migrations applied");
        Ok(())
    }

    /// Insert or replace a profile (seeding and tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, subscription_tier, subscription_status, deletion_token_expires)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                subscription_tier = EXCLUDED.subscription_tier,
                subscription_status = EXCLUDED.subscription_status,
                deletion_token_expires = EXCLUDED.deletion_token_expires",
        )
        .bind(profile.user_id.as_uuid())
        .bind(&profile.subscription_tier)
        .bind(profile.subscription_status.as_str())
        .bind(profile.deletion_token_expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write a configuration value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn put_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO global_config (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn corrupt(entity: &'static str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        entity,
        reason: reason.to_string(),
    }
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry> {
    let id: String = row.try_get("id")?;
    let user_id: uuid::Uuid = row.try_get("user_id")?;
    let operation_type: String = row.try_get("operation_type")?;
    let period_type: String = row.try_get("period_type")?;
    let period_key: String = row.try_get("period_key")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(LedgerEntry {
        id: id.parse().map_err(|e| corrupt("usage event", e))?,
        user_id: UserId::from_uuid(user_id),
        operation_type: OperationType::from(operation_type),
        provider: row.try_get("ai_provider")?,
        credit_delta: row.try_get("credits_used")?,
        period_type: period_type.parse().map_err(|e| corrupt("usage event", e))?,
        period_key: PeriodKey::from_raw(period_key),
        created_at,
    })
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events
                (id, user_id, operation_type, ai_provider, credits_used, period_type, period_key, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.as_uuid())
        .bind(entry.operation_type.as_str())
        .bind(entry.provider.as_deref())
        .bind(entry.credit_delta)
        .bind(entry.period_type.as_str())
        .bind(entry.period_key.as_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn period_deltas(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
        period_key: &PeriodKey,
    ) -> Result<Vec<PeriodDelta>> {
        let rows = sqlx::query(
            "SELECT operation_type, credits_used FROM usage_events
             WHERE user_id = $1 AND period_type = $2 AND period_key = $3",
        )
        .bind(user_id.as_uuid())
        .bind(period_type.as_str())
        .bind(period_key.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let operation_type: String = row.try_get("operation_type")?;
                Ok(PeriodDelta {
                    operation_type: OperationType::from(operation_type),
                    credit_delta: row.try_get("credits_used")?,
                })
            })
            .collect()
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let limit = i64::try_from(limit).map_err(|e| StoreError::Database(e.to_string()))?;
        let offset = i64::try_from(offset).map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT id, user_id, operation_type, ai_provider, credits_used, period_type, period_key, created_at
             FROM usage_events
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn count_for_user(&self, user_id: &UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_events WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|e| corrupt("usage event count", e))
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_config(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let value = sqlx::query_scalar("SELECT value FROM global_config WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT subscription_tier, subscription_status, deletion_token_expires
             FROM profiles WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.try_get("subscription_status")?;
            Ok(UserProfile {
                user_id: *user_id,
                subscription_tier: row.try_get("subscription_tier")?,
                subscription_status: SubscriptionStatus::from(status),
                deletion_token_expires: row.try_get("deletion_token_expires")?,
            })
        })
        .transpose()
    }
}
