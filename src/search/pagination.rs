//! Page-based pagination

use serde::{Deserialize, Serialize};

/// Page size used when the caller passes a non-positive size
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Normalised 1-based pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page_index: u64,
    page_size: u64,
}

impl Pagination {
    /// Non-positive page indexes become page 1, non-positive sizes become
    /// [`DEFAULT_PAGE_SIZE`].
    pub fn new(page_index: i64, page_size: i64) -> Self {
        let page_index = if page_index <= 0 { 1 } else { page_index as u64 };
        let page_size = if page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size as u64
        };

        Self {
            page_index,
            page_size,
        }
    }

    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// 0-based document offset of the page
    pub fn offset(&self) -> u64 {
        (self.page_index - 1).saturating_mul(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}
