use crate::error::CoreError;
use serde::Serialize;

/// A validated, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub items_per_page: u32,
}

impl Pagination {
    /// Rejects page `0` and an empty page size.
    pub fn new(page: u32, items_per_page: u32) -> Result<Self, CoreError> {
        if page == 0 {
            return Err(CoreError::InvalidInput(
                "page".to_string(),
                "pages are 1-indexed".to_string(),
            ));
        }
        if items_per_page == 0 {
            return Err(CoreError::InvalidInput(
                "items_per_page".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(Self { page, items_per_page })
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1).saturating_mul(i64::from(self.items_per_page))
    }

    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.items_per_page)
    }
}

/// One page of rows plus the number of rows matching the query overall.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// Count of all matching rows, ignoring pagination.
    pub total: i64,
    pub page: u32,
    pub items_per_page: u32,
}

impl<T> Page<T> {
    pub fn new(rows: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            rows,
            total,
            page: pagination.page,
            items_per_page: pagination.items_per_page,
        }
    }

    /// Number of pages needed for `total` rows; at least 1.
    pub fn total_pages(&self) -> u64 {
        let total = self.total.max(0) as u64;
        let per_page = u64::from(self.items_per_page.max(1));
        total.div_ceil(per_page).max(1)
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Splits into the `(page_rows, total_row_count)` pair.
    pub fn into_parts(self) -> (Vec<T>, i64) {
        (self.rows, self.total)
    }
}
