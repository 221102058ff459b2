//! One page of a paged fetch.

use serde::Serialize;

/// A page of results plus the totals needed to render paging controls.
///
/// `D` is the page's data: `Vec<T>` for typed pages, [`RowSet`] for raw ones.
///
/// [`RowSet`]: rowgraph_core::RowSet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedData<D> {
    pub data: D,
    pub page_size: u64,
    /// Zero-based.
    pub page_index: u64,
    pub total_records: u64,
    /// `ceil(total_records / page_size)`, or 0 when `page_size` is 0.
    pub total_pages: u64,
}

impl<D> PagedData<D> {
    pub fn new(data: D, page_size: u64, page_index: u64, total_records: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_records.div_ceil(page_size)
        };
        Self {
            data,
            page_size,
            page_index,
            total_records,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page_index.saturating_add(1) < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 0
    }

    /// Replace the page's data, keeping the totals.
    pub fn map<E>(self, f: impl FnOnce(D) -> E) -> PagedData<E> {
        PagedData {
            data: f(self.data),
            page_size: self.page_size,
            page_index: self.page_index,
            total_records: self.total_records,
            total_pages: self.total_pages,
        }
    }
}
