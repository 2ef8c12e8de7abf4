//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use marag_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide limiter shared by all connections
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter. Zero rates are clamped to one.
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Arc<GlobalRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    Arc::new(RateLimiter::direct(quota))
}

/// Reject with 429 once the bucket is empty
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<GlobalRateLimiter>,
    limit: u32,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            AppError::RateLimited { limit }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = create_rate_limiter(100, 200);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_burst_exhausts() {
        let limiter = create_rate_limiter(1, 2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let limiter = create_rate_limiter(0, 0);
        assert!(limiter.check().is_ok());
    }
}
