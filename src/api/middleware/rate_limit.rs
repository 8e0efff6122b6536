//! Rate limiting middleware using Redis cache.
//!
//! Three tiers keyed by client IP. Requests are denied when Redis cannot be
//! reached.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_SENSITIVE_REQUESTS, RATE_LIMIT_SENSITIVE_WINDOW_SECONDS, RATE_LIMIT_WINDOW_SECONDS,
};

const HEADER_LIMIT: &str = "X-RateLimit-Limit";
const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
const HEADER_RETRY_AFTER: &str = "Retry-After";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tier {
    name: &'static str,
    requests: u64,
    window_seconds: u64,
}

const GENERAL: Tier = Tier {
    name: "general",
    requests: RATE_LIMIT_REQUESTS,
    window_seconds: RATE_LIMIT_WINDOW_SECONDS,
};

const AUTH: Tier = Tier {
    name: "auth",
    requests: RATE_LIMIT_AUTH_REQUESTS,
    window_seconds: RATE_LIMIT_AUTH_WINDOW_SECONDS,
};

const SENSITIVE: Tier = Tier {
    name: "sensitive",
    requests: RATE_LIMIT_SENSITIVE_REQUESTS,
    window_seconds: RATE_LIMIT_SENSITIVE_WINDOW_SECONDS,
};

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub limit: u64,
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_RETRY_AFTER, HeaderValue::from(self.retry_after));
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket.
fn client_identifier(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("X-Forwarded-For")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = header("X-Real-IP") {
        return ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

async fn enforce(
    tier: Tier,
    state: &AppState,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let denied = |retry_after| RateLimitError {
        limit: tier.requests,
        retry_after,
    };

    let Some(cache) = state.cache.as_ref() else {
        tracing::error!(tier = tier.name, "Rate limiter has no Redis - denying request");
        return Err(denied(tier.window_seconds));
    };

    let client = client_identifier(&request);
    let key = format!("{}:{}", tier.name, client);

    let status = match cache
        .check_rate_limit(&key, tier.requests, tier.window_seconds)
        .await
    {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(tier = tier.name, error = %e, "Rate limit check failed - denying request");
            return Err(denied(tier.window_seconds));
        }
    };

    if !status.allowed {
        tracing::warn!(
            tier = tier.name,
            client = %client,
            count = status.count,
            "Rate limit exceeded"
        );
        return Err(denied(status.reset_in));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(HEADER_LIMIT, HeaderValue::from(tier.requests));
    headers.insert(
        HEADER_REMAINING,
        HeaderValue::from(tier.requests.saturating_sub(status.count)),
    );

    Ok(response)
}

/// General tier: RATE_LIMIT_REQUESTS per RATE_LIMIT_WINDOW_SECONDS.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(GENERAL, &state, request, next).await
}

/// Stricter tier for registration and login.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(AUTH, &state, request, next).await
}

/// Strictest tier for deposits, withdrawals, conversions, purchases and
/// security settings.
pub async fn rate_limit_sensitive_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(SENSITIVE, &state, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_rate_limit_error_response() {
        let response = RateLimitError {
            limit: 5,
            retry_after: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[HEADER_RETRY_AFTER], "42");
        assert_eq!(response.headers()[HEADER_LIMIT], "5");
        assert_eq!(response.headers()[HEADER_REMAINING], "0");
    }

    #[test]
    fn test_client_identifier_prefers_first_forwarded_hop() {
        let req = request(&[
            ("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(client_identifier(&req), "203.0.113.7");
    }

    #[test]
    fn test_client_identifier_fallbacks() {
        assert_eq!(
            client_identifier(&request(&[("X-Real-IP", "198.51.100.2")])),
            "198.51.100.2"
        );

        let mut req = request(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_identifier(&req), "192.0.2.1");

        assert_eq!(client_identifier(&request(&[])), "unknown");
    }

    #[test]
    fn test_tiers_tighten() {
        assert!(SENSITIVE.requests < AUTH.requests);
        assert!(AUTH.requests < GENERAL.requests);
    }
}
