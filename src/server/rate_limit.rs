//! Governor-backed token bucket shared by all streaming requests.
//!
//! The bucket refills at `per_second` tokens per second up to `burst`
//! tokens. Governor's GCRA state is a single atomic, so concurrent checks
//! never hand out more tokens than the bucket holds.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reelhouse_common::Error;
use std::num::NonZeroU32;
use std::sync::Arc;

use super::error::AppError;

/// Process-wide limiter for stream requests.
pub struct StreamLimiter<C: Clock = DefaultClock> {
    inner: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
    per_second: u32,
    burst: u32,
}

/// A shared rate limiter instance.
pub type SharedLimiter = Arc<StreamLimiter>;

impl StreamLimiter {
    /// Create a limiter on the wall clock. Zero values are raised to one.
    pub fn new(per_second: u32, burst: u32) -> Self {
        Self::with_clock(per_second, burst, &DefaultClock::default())
    }
}

impl<C: Clock> StreamLimiter<C> {
    /// Create a limiter driven by `clock`; the bucket starts full.
    pub fn with_clock(per_second: u32, burst: u32, clock: &C) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let cap = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(cap);

        Self {
            inner: RateLimiter::direct_with_clock(quota, clock),
            per_second: rate.get(),
            burst: cap.get(),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

/// Rejects the request with 429 before any file access when the bucket is
/// empty.
pub async fn rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.try_acquire() {
        tracing::debug!(path = %request.uri().path(), "Stream request rate limited");
        return AppError::from(Error::RateLimited).into_response();
    }

    next.run(request).await
}
