//! Success envelope for JSON responses.
//!
//! ```json
//! { "success": true, "data": ..., "pagination": { ... } }
//! ```
//!
//! Errors use the matching `{ "success": false, "error": ... }` envelope from
//! [`crate::error::AppError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use ubuntu_lend_core::{PageRequest, Pagination};

use crate::db::query::Page;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// A `201 Created` response.
    pub const fn created(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
            status: StatusCode::CREATED,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// One page of a list, with its pagination block.
    pub fn page(page: Page<T>, request: PageRequest) -> Self {
        Self {
            success: true,
            pagination: Some(request.paginate(page.total_count)),
            data: page.items,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn json(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ok_envelope_has_no_pagination() {
        let (status, body) = json(ApiResponse::ok("hello").into_response()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "hello");
        assert!(body.get("pagination").is_none());
        assert!(body.get("status").is_none());
    }

    #[tokio::test]
    async fn test_page_envelope() {
        let page = Page {
            items: vec![1, 2, 3],
            total_count: 23,
        };
        let request = PageRequest::new(Some(3), Some(10));
        let (_, body) = json(ApiResponse::page(page, request).into_response()).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["pagination"]["page"], 3);
        assert_eq!(body["pagination"]["limit"], 10);
        assert_eq!(body["pagination"]["totalCount"], 23);
        assert_eq!(body["pagination"]["totalPages"], 3);
    }

    #[tokio::test]
    async fn test_created_status() {
        let (status, _) = json(ApiResponse::created(()).into_response()).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}
