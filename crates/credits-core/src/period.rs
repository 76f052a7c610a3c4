//! Accounting periods.
//!
//! A period is identified by its [`PeriodType`] plus a [`PeriodKey`]. Keys are
//! a pure function of the UTC wall clock: a new month simply yields a new key
//! with an empty aggregate, and older entries stay attached to their old key.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// The literal key shared by every lifetime-scoped entry.
pub const LIFETIME_KEY: &str = "lifetime";

/// How long a credit allotment lasts before it refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Consumed once, never resets.
    Lifetime,
    /// Refills on the first of every UTC calendar month.
    Monthly,
    /// Resets every UTC day. Used for rate-limited, zero-cost operations.
    Daily,
}

impl PeriodType {
    /// Get the period type name as stored in the ledger.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lifetime => "lifetime",
            Self::Monthly => "monthly",
            Self::Daily => "daily",
        }
    }

    /// Single-byte tag used when building ordered storage keys.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Lifetime => b'L',
            Self::Monthly => b'M',
            Self::Daily => b'D',
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifetime" => Ok(Self::Lifetime),
            "monthly" => Ok(Self::Monthly),
            "daily" => Ok(Self::Daily),
            other => Err(LedgerError::InvalidPeriodType(other.to_string())),
        }
    }
}

/// The specific period instance an entry belongs to.
///
/// `"lifetime"`, `"YYYY-MM"` or `"YYYY-MM-DD"`, always in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// The lifetime key.
    #[must_use]
    pub fn lifetime() -> Self {
        Self(LIFETIME_KEY.to_string())
    }

    /// Compute the key of the period of `period_type` containing `at`.
    #[must_use]
    pub fn for_instant(period_type: PeriodType, at: DateTime<Utc>) -> Self {
        match period_type {
            PeriodType::Lifetime => Self::lifetime(),
            PeriodType::Monthly => Self(at.format("%Y-%m").to_string()),
            PeriodType::Daily => Self(at.format("%Y-%m-%d").to_string()),
        }
    }

    /// Wrap a key read back from storage.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last instant (inclusive, second precision) of the period named by this key.
    ///
    /// Lifetime periods never end and return `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPeriodKey`] if the key does not match the
    /// format implied by `period_type`.
    pub fn period_end(&self, period_type: PeriodType) -> Result<Option<DateTime<Utc>>, LedgerError> {
        let start = match period_type {
            PeriodType::Lifetime => return Ok(None),
            PeriodType::Monthly => {
                let first = NaiveDate::parse_from_str(&format!("{}-01", self.0), "%Y-%m-%d")
                    .map_err(|_| self.invalid())?;
                // Reject trailing junk such as "2026-02-15" for a monthly key.
                if first.format("%Y-%m").to_string() != self.0 {
                    return Err(self.invalid());
                }
                first
            }
            PeriodType::Daily => {
                let day =
                    NaiveDate::parse_from_str(&self.0, "%Y-%m-%d").map_err(|_| self.invalid())?;
                if day.format("%Y-%m-%d").to_string() != self.0 {
                    return Err(self.invalid());
                }
                day
            }
        };

        let next_start = match period_type {
            PeriodType::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| self.invalid())?
            }
            _ => start.succ_opt().ok_or_else(|| self.invalid())?,
        };

        let midnight = next_start.and_hms_opt(0, 0, 0).ok_or_else(|| self.invalid())?;
        Ok(Some(Utc.from_utc_datetime(&midnight) - Duration::seconds(1)))
    }

    fn invalid(&self) -> LedgerError {
        LedgerError::InvalidPeriodKey(self.0.clone())
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
