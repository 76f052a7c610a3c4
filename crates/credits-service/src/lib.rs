//! Usage credit accounting.
//!
//! This crate decides whether a user may run a credit-consuming operation,
//! records what it cost, and derives balances from the append-only ledger:
//!
//! - [`TierCatalog`]: tier policies read through from configuration
//! - [`BalanceCalculator`]: per-period balance summaries
//! - [`CreditGate`]: admission checks and in-process reservations
//! - [`UsageRecorder`]: charge-on-success recording and referral bonuses
//! - [`HistoryReader`]: paginated usage history
//! - [`DailyQuota`]: rate limits for zero-cost operations
//!
//! [`Accounting`] wires all of them over one [`Stores`] set.
//!
//! # Charging
//!
//! Callers check, run the expensive work, and record only on success:
//!
//! ```no_run
//! use credits_core::{OperationType, UserId};
//! use credits_service::{Accounting, AccountingError, ServiceConfig, Stores};
//!
//! # async fn generate_letter() -> Result<String, AccountingError> { Ok(String::new()) }
//! # async fn example(user_id: UserId) -> Result<(), AccountingError> {
//! let (stores, _) = Stores::in_memory();
//! let accounting = Accounting::new(stores, &ServiceConfig::default());
//!
//! let letter = accounting
//!     .run_metered(&user_id, OperationType::CoverLetter, 1, || async {
//!         let letter = generate_letter().await?;
//!         Ok::<_, AccountingError>((letter, Some("claude".to_string())))
//!     })
//!     .await?;
//! # let _ = letter;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Errors are documented on the component methods

pub mod accounting;
pub mod balance;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod quota;
pub mod recorder;
pub mod state;
pub mod telemetry;
pub mod tiers;

pub use accounting::Accounting;
pub use balance::BalanceCalculator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ServiceConfig, StoreBackend};
pub use error::{AccountingError, Result};
pub use gate::{CreditGate, Reservation};
pub use history::HistoryReader;
pub use quota::DailyQuota;
pub use recorder::UsageRecorder;
pub use state::{open_stores, Stores};
pub use telemetry::init_tracing;
pub use tiers::{ResolvedTier, TierCatalog};
