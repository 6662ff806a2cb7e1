//! Request ID middleware for request tracing and correlation.
//!
//! Honours an upstream `x-request-id` header or generates a UUID v4. The ID
//! is recorded on the tracing span, tagged on the Sentry scope and echoed in
//! the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted verbatim.
const MAX_REQUEST_ID_LENGTH: usize = 128;

fn request_id_from(request: &Request) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LENGTH)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request_id_from(&request);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    #[test]
    fn test_upstream_id_is_kept() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "cf-1234")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id_from(&request), "cf-1234");
    }

    #[test]
    fn test_missing_or_oversized_id_is_replaced() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(Uuid::parse_str(&request_id_from(&request)).is_ok());

        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "x".repeat(200))
            .body(Body::empty())
            .unwrap();
        assert!(Uuid::parse_str(&request_id_from(&request)).is_ok());
    }
}
