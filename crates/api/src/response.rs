//! Shared response envelope types for API handlers.
//!
//! Single entities use `{ "data": ... }`; lists add a `pagination` block.

use serde::Serialize;
use skillforge_core::pagination::Pagination;

use crate::query::PageParams;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "data": [...], "pagination": { page, limit, total, pages } }`.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PageParams, total: i64) -> Self {
        Self {
            data,
            pagination: Pagination::new(params.page(), params.limit(), total),
        }
    }
}
