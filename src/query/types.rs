use std::ops::Range;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::core::types::ProductRecord;

/// Validated `limit` / `offset` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pagination {
    pub limit: Option<usize>,  // None = unbounded
    pub offset: usize,
}

impl Pagination {
    /// Negative arguments are rejected; `limit = Some(0)` is a valid empty page.
    pub fn new(limit: Option<i64>, offset: i64) -> Result<Self> {
        if offset < 0 {
            return Err(Error::invalid_argument(format!("offset must be >= 0, got {}", offset)));
        }
        let limit = match limit {
            Some(l) if l < 0 => {
                return Err(Error::invalid_argument(format!("limit must be >= 0, got {}", l)));
            }
            Some(l) => Some(l as usize),
            None => None,
        };
        Ok(Pagination {
            limit,
            offset: offset as usize,
        })
    }

    pub fn all() -> Self {
        Pagination::default()
    }

    pub fn first(limit: usize) -> Self {
        Pagination {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub fn is_empty_page(&self) -> bool {
        self.limit == Some(0)
    }

    /// Number of matches needed before the page is complete.
    pub fn end(&self) -> Option<usize> {
        self.limit.map(|limit| self.offset.saturating_add(limit))
    }

    /// Window over a sequence of `len` items, clamped to its bounds.
    pub fn range(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        let end = match self.limit {
            Some(limit) => start.saturating_add(limit).min(len),
            None => len,
        };
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range(items.len())]
    }
}

/// One page of a bucket listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, pagination: Pagination) -> Self {
        Page {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

/// Timing and diagnostics attached to every query answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub took_us: u64,
    pub cache_hit: bool,
    pub count: usize,
    pub snapshot_version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse<T> {
    pub data: T,
    pub meta: QueryMeta,
}

impl<T> QueryResponse<T> {
    pub fn into_data(self) -> T {
        self.data
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryResponse<U> {
        QueryResponse {
            data: f(self.data),
            meta: self.meta,
        }
    }
}

/// Number of items a query answer carries, reported in [`QueryMeta::count`].
pub trait ResultCount {
    fn result_count(&self) -> usize;
}

impl<T> ResultCount for Vec<T> {
    fn result_count(&self) -> usize {
        self.len()
    }
}

impl<T> ResultCount for Option<T> {
    fn result_count(&self) -> usize {
        usize::from(self.is_some())
    }
}

impl<T> ResultCount for Page<T> {
    fn result_count(&self) -> usize {
        self.items.len()
    }
}

impl ResultCount for usize {
    fn result_count(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// A ranked SKU resolved against the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopSeller {
    pub rank: usize,
    pub total_sold: u64,
    pub product: ProductRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_arguments() {
        assert!(Pagination::new(Some(-1), 0).unwrap_err().is_invalid_argument());
        assert!(Pagination::new(None, -5).unwrap_err().is_invalid_argument());
        assert!(Pagination::new(Some(0), 0).is_ok());
    }

    #[test]
    fn windows_are_clamped() {
        let items = [1, 2, 3, 4, 5];
        let page = |limit, offset| Pagination::new(limit, offset).unwrap();

        assert_eq!(page(Some(2), 1).slice(&items), &[2, 3]);
        assert_eq!(page(None, 3).slice(&items), &[4, 5]);
        assert_eq!(page(Some(10), 4).slice(&items), &[5]);
        assert!(page(Some(2), 99).slice(&items).is_empty());
        assert!(page(Some(0), 0).slice(&items).is_empty());
        assert_eq!(page(Some(2), 1).end(), Some(3));
    }

    #[test]
    fn page_reports_remaining_items() {
        let p = Page::new(vec![1, 2], 5, Pagination::first(2));
        assert!(p.has_more());
        let last = Page::new(vec![5], 5, Pagination::new(Some(2), 4).unwrap());
        assert!(!last.has_more());
    }
}
