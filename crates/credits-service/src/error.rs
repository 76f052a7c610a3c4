//! Accounting error types.

use credits_core::{LedgerError, OperationType, UserId};
use credits_store::StoreError;

/// Result type for accounting operations.
pub type Result<T> = std::result::Result<T, AccountingError>;

/// Accounting error type.
#[derive(Debug, thiserror::Error)]
pub enum AccountingError {
    /// Storage collaborator failed. Propagated unchanged, never retried.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The user has no profile, so their tier is unknown.
    #[error("profile not found for user {0}")]
    ProfileNotFound(UserId),

    /// A configuration value exists but cannot be used.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// History page outside the accepted range.
    #[error("invalid page request: page={page}, page_size={page_size} (max {max_page_size})")]
    InvalidPageRequest {
        /// Requested page (1-indexed).
        page: u32,
        /// Requested page size.
        page_size: u32,
        /// Largest accepted page size.
        max_page_size: u32,
    },

    /// Reservation rejected.
    #[error("insufficient credits: remaining={remaining}, required={required}")]
    InsufficientCredits {
        /// Credits left after in-flight reservations.
        remaining: i64,
        /// Requested cost.
        required: i64,
    },

    /// Daily quota for a zero-cost operation used up.
    #[error("daily limit reached for {operation}: {used}/{limit}")]
    DailyLimitExceeded {
        /// Rate-limited operation.
        operation: OperationType,
        /// Entries already recorded today.
        used: u64,
        /// Allowed entries per UTC day.
        limit: u32,
    },

    /// Credit amount outside the accepted range for a single entry.
    #[error("invalid credit cost: {0}")]
    InvalidCost(i64),

    /// Malformed ledger data (period key, identifier).
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AccountingError {
    /// Stable machine-readable code, for callers translating errors into
    /// responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Store(_) | Self::Ledger(_) => "internal_error",
            Self::ProfileNotFound(_) => "unauthorized",
            Self::Configuration(_) => "configuration_error",
            Self::InvalidPageRequest { .. } | Self::InvalidCost(_) => "bad_request",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::DailyLimitExceeded { .. } => "rate_limited",
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
