//! Error types for the credit ledger core.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised while building or interpreting ledger values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A period type name is not one of lifetime, monthly, daily.
    #[error("invalid period type: {0}")]
    InvalidPeriodType(String),

    /// A period key does not match the format of its period type.
    #[error("invalid period key: {0}")]
    InvalidPeriodKey(String),

    /// A credit amount cannot be represented as a ledger delta.
    #[error("credit amount out of range: {0}")]
    CreditOutOfRange(i64),

    /// Summing a period's deltas overflowed.
    #[error("credit total overflowed")]
    CreditOverflow,

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
