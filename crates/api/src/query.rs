//! Shared query parameter types for API handlers.

use serde::Deserialize;
use skillforge_core::pagination;
use skillforge_core::types::DbId;

/// Page-based pagination parameters (`?page=&limit=`).
///
/// Handlers take this as a separate `Query` extractor next to their
/// filter struct; both read the same query string.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        pagination::clamp_page(self.page)
    }

    pub fn limit(&self) -> i64 {
        pagination::clamp_limit(self.limit)
    }

    pub fn offset(&self) -> i64 {
        pagination::offset_for(self.page(), self.limit())
    }
}

/// Optional `?class_id=` disambiguating a (user, skill) rating.
#[derive(Debug, Deserialize)]
pub struct ClassScope {
    pub class_id: Option<DbId>,
}

/// Free-text search (`?q=`).
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), pagination::DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn offset_follows_clamped_values() {
        let params = PageParams {
            page: Some(3),
            limit: Some(1000),
        };
        assert_eq!(params.limit(), pagination::MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 2 * pagination::MAX_PAGE_SIZE);
    }
}
