//! Request spacing
//!
//! Uses the governor crate as a one-token bucket: the first request goes
//! out immediately, every later one waits until `delay` has passed since
//! the previous permit.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Enforces a minimum delay between consecutive requests
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>>,
    delay: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing one request per `delay`
    ///
    /// A zero delay disables limiting.
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(Governor::direct(quota)));

        Self { limiter, delay }
    }

    /// Wait until the next request may be sent
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Try to take a permit without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }

    /// Configured spacing
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether requests are actually spaced
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("delay", &self.delay)
            .finish()
    }
}
