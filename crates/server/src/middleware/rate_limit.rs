//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Auth endpoints are limited per client IP. By default a client gets a
//! burst of 5 requests with one replenished every 6 seconds, keyed on the
//! peer address of the connection.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;
use crate::error::AppError;

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor for the client IP.
///
/// Uses the connection's peer address. Proxy headers are consulted first
/// only when `trust_proxy_headers` is set, since any client can send them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpKeyExtractor {
    pub trust_proxy_headers: bool,
}

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn peer_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = || {
            header_ip(req, "cf-connecting-ip")
                .or_else(|| header_ip(req, "x-forwarded-for"))
                .or_else(|| header_ip(req, "x-real-ip"))
        };
        self.trust_proxy_headers
            .then(forwarded)
            .flatten()
            .or_else(|| peer_ip(req))
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the rate limiter for auth endpoints.
///
/// # Panics
///
/// Never panics: both quotas are clamped to at least 1, which is all
/// `GovernorConfigBuilder::finish` checks.
#[must_use]
pub fn auth_rate_limiter(limits: RateLimitConfig) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor {
            trust_proxy_headers: limits.trust_proxy_headers,
        })
        .per_second(limits.replenish_seconds.max(1))
        .burst_size(limits.burst_size.max(1))
        .finish()
        .expect("rate limiter quotas are non-zero");
    GovernorLayer::new(Arc::new(config))
}

/// Give limiter rejections the JSON error envelope.
///
/// The limiter answers with plain text; its `retry-after` and
/// `x-ratelimit-*` headers are carried over.
pub async fn rate_limit_envelope(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (parts, _) = response.into_parts();
    let mut limited = AppError::RateLimited.into_response();
    for (name, value) in &parts.headers {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            limited.headers_mut().insert(name.clone(), value.clone());
        }
    }
    limited
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const TRUSTING: ClientIpKeyExtractor = ClientIpKeyExtractor {
        trust_proxy_headers: true,
    };

    fn peer(ip: [u8; 4]) -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from((ip, 40_000)))
    }

    #[test]
    fn test_untrusted_headers_are_ignored() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("cf-connecting-ip", "198.51.100.2")
            .extension(peer([192, 0, 2, 44]))
            .body(())
            .unwrap();
        assert_eq!(
            ClientIpKeyExtractor::default().extract(&req).unwrap(),
            "192.0.2.44".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_trusted_forwarded_for_uses_first_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .extension(peer([10, 0, 0, 1]))
            .body(())
            .unwrap();
        assert_eq!(
            TRUSTING.extract(&req).unwrap(),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_trusted_cloudflare_header_wins() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("cf-connecting-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(
            TRUSTING.extract(&req).unwrap(),
            "198.51.100.2".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_trusted_without_headers_falls_back_to_peer() {
        let req = Request::builder()
            .extension(peer([192, 0, 2, 9]))
            .body(())
            .unwrap();
        assert_eq!(
            TRUSTING.extract(&req).unwrap(),
            "192.0.2.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_no_address_is_an_error() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert!(ClientIpKeyExtractor::default().extract(&req).is_err());
    }

    #[tokio::test]
    async fn test_limited_response_gets_envelope() {
        let limited = Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header(header::RETRY_AFTER, "6")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("Too Many Requests! Wait for 6s"))
            .unwrap();

        let response = rate_limit_envelope(limited).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "6");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Too many requests, please slow down");
    }

    #[tokio::test]
    async fn test_other_responses_pass_through() {
        let ok = Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("fine"))
            .unwrap();
        assert_eq!(rate_limit_envelope(ok).await.status(), StatusCode::OK);
    }
}
