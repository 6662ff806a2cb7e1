//! Page/limit pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// A validated page request.
///
/// Page numbers are 1-based. `limit` is clamped to `1..=MAX_LIMIT` so a
/// client cannot ask for an unbounded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page request from optional query-string values.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Row offset for SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Summary block for a page of results out of `total_count` rows.
    #[must_use]
    pub fn paginate(&self, total_count: i64) -> Pagination {
        Pagination::new(self.page, self.limit, total_count)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata returned next to a page of `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_count: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// `total_pages` is `ceil(total_count / limit)`, zero for an empty set.
    #[must_use]
    pub fn new(page: u32, limit: u32, total_count: i64) -> Self {
        let total_count = total_count.max(0);
        let limit_i64 = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total_count,
            total_pages: (total_count + limit_i64 - 1) / limit_i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 10);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!((req.page(), req.limit()), (1, 1));

        let req = PageRequest::new(Some(3), Some(5_000));
        assert_eq!(req.limit(), PageRequest::MAX_LIMIT);
        assert_eq!(req.offset(), 200);
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        for (total, limit, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (11, 10, 2), (95, 20, 5)] {
            let p = Pagination::new(1, limit, total);
            assert_eq!(p.total_pages, expected, "total={total} limit={limit}");
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(PageRequest::new(Some(2), Some(25)).paginate(51)).ok();
        let json = json.unwrap_or_default();
        assert_eq!(json["totalCount"], 51);
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["page"], 2);
    }
}
