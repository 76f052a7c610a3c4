//! Paginated usage history.

use std::sync::Arc;

use credits_core::{UsageHistory, UserId};
use credits_store::LedgerStore;

use crate::error::{AccountingError, Result};

/// Reads a user's ledger newest first, one page at a time.
#[derive(Clone)]
pub struct HistoryReader {
    ledger: Arc<dyn LedgerStore>,
    default_page_size: u32,
    max_page_size: u32,
}

impl HistoryReader {
    /// Create a reader accepting page sizes up to `max_page_size`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, default_page_size: u32, max_page_size: u32) -> Self {
        Self {
            ledger,
            default_page_size,
            max_page_size,
        }
    }

    /// Page size used by [`Self::latest`].
    #[must_use]
    pub const fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// One page of the user's entries. `page` is 1-indexed.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError::InvalidPageRequest`] for page 0 or a page
    /// size outside `1..=max_page_size`, or any ledger error.
    pub async fn get_usage_history(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
    ) -> Result<UsageHistory> {
        if page == 0 || page_size == 0 || page_size > self.max_page_size {
            return Err(AccountingError::InvalidPageRequest {
                page,
                page_size,
                max_page_size: self.max_page_size,
            });
        }

        let offset = (page as usize - 1) * page_size as usize;
        let items = self
            .ledger
            .history(user_id, page_size as usize, offset)
            .await?;
        let total = self.ledger.count_for_user(user_id).await?;

        tracing::debug!(user_id = %user_id, page, page_size, total, "Usage history read");

        Ok(UsageHistory {
            items,
            total,
            page,
            page_size,
        })
    }

    /// First page at the default page size.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_usage_history`].
    pub async fn latest(&self, user_id: &UserId) -> Result<UsageHistory> {
        self.get_usage_history(user_id, 1, self.default_page_size)
            .await
    }
}

impl std::fmt::Debug for HistoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryReader")
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}
