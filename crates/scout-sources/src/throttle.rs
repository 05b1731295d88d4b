//! Harvest pacing.
//!
//! Review sources are public endpoints that tolerate roughly one request per
//! second before throttling or banning the client. All enrichment units share
//! one [`HarvestThrottle`] so concurrent units queue up instead of bursting.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Direct (unkeyed) limiter shared by all enrichment units.
type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Async token bucket admitting a fixed number of harvest calls per second.
pub struct HarvestThrottle {
    limiter: DirectRateLimiter,
}

impl HarvestThrottle {
    /// Create a throttle admitting `per_sec` calls per second, one at a time.
    ///
    /// Zero is coerced to one; a throttle that never admits would deadlock
    /// every enrichment unit.
    pub fn new(per_sec: u32) -> Self {
        let per_sec = NonZeroU32::new(per_sec).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_sec).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the next harvest call is admitted.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
