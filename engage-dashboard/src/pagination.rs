//! Page arithmetic for projection listings

/// Rows per dashboard page
pub const PAGE_SIZE: i64 = 100;

/// Resolved page of a listing with `total` rows
///
/// `page` is always in `1..=max(total_pages, 1)`, so an empty listing still
/// reports page 1 of 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// Clamp `requested_page` against `total` rows at [`PAGE_SIZE`]
    ///
    /// ```
    /// use engage_dashboard::pagination::Pagination;
    ///
    /// let p = Pagination::new(250, 99);
    /// assert_eq!(p.page, 3);
    /// assert_eq!(p.offset(), 200);
    /// ```
    pub fn new(total: i64, requested_page: i64) -> Self {
        Self::with_page_size(total, requested_page, PAGE_SIZE)
    }

    pub fn with_page_size(total: i64, requested_page: i64, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = (total.max(0) + page_size - 1) / page_size;
        Self {
            page: requested_page.clamp(1, total_pages.max(1)),
            page_size,
            total_pages,
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}
