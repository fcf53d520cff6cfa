//! Page/limit pagination utilities.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not specify one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// A normalized page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Builds a page request, clamping the page to at least 1 and the limit to `1..=MAX_LIMIT`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned with list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit.max(1));
        let total_pages = total.div_ceil(limit) as u32;
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_next: request.page < total_pages,
            has_previous: request.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(1000));
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, MAX_LIMIT);

        let req = PageRequest::new(Some(3), Some(0));
        assert_eq!(req.limit, 1);
        assert_eq!(req.offset(), 2);
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(PageRequest::new(Some(2), Some(10)), 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);

        let last = Pagination::new(PageRequest::new(Some(3), Some(10)), 25);
        assert!(!last.has_next);
    }

    #[test]
    fn test_pagination_empty() {
        let p = Pagination::new(PageRequest::default(), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }

    #[test]
    fn test_pagination_serialization() {
        let p = Pagination::new(PageRequest::default(), 5);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"total\":5"));
        assert!(json.contains("\"total_pages\":1"));
    }
}
