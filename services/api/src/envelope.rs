//! Uniform response envelope
//!
//! Success: `{ "success": true, "data": ..., "pagination"?: {...} }`
//! Failure: `{ "success": false, "error": "..." }`

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    /// `pages = ceil(total / limit)`
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Successful response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Failure body, produced by [`crate::error::ApiError`]
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pages_is_ceiling_of_total_over_limit() {
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 1).pages, 1);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).pages, 2);
        assert_eq!(Pagination::new(3, 12, 25).pages, 3);
    }

    #[test]
    fn test_success_shape() {
        let body = serde_json::to_value(ApiResponse::ok(json!({ "id": "a" }))).unwrap();
        assert_eq!(body, json!({ "success": true, "data": { "id": "a" } }));
    }

    #[test]
    fn test_paginated_shape() {
        let response = ApiResponse::paginated(Vec::<u8>::new(), Pagination::new(2, 5, 0));
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": [],
                "pagination": { "page": 2, "limit": 5, "total": 0, "pages": 0 }
            })
        );
    }

    #[test]
    fn test_created_sets_status() {
        let response = ApiResponse::created(json!({})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
