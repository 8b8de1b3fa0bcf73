//! Per-workspace LLM provider rate limiting.
//!
//! Token-bucket limiting via `governor`, keyed by workspace id so one
//! workspace's burst cannot starve another's share of the provider.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use uuid::Uuid;

pub struct WorkspaceRateLimiter {
    inner: GovernorRateLimiter<Uuid, DefaultKeyedStateStore<Uuid>, DefaultClock>,
}

impl WorkspaceRateLimiter {
    /// `requests_per_minute` sets both the refill rate and the burst
    /// capacity, mirroring the provider's own per-key quota.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute.max(1)).unwrap();
        let quota = Quota::per_minute(per_minute);
        Self { inner: GovernorRateLimiter::keyed(quota) }
    }

    /// Builds the limiter from the provider's configured rate, rounding the
    /// per-second figure up to the nearest whole request and applying
    /// `burst_size` as the bucket capacity.
    pub fn from_rate(requests_per_second: f64, burst_size: u32) -> Self {
        let rps = NonZeroU32::new((requests_per_second.ceil().max(1.0)) as u32).unwrap();
        let burst = NonZeroU32::new(burst_size.max(1)).unwrap();
        let quota = Quota::per_second(rps).allow_burst(burst);
        Self { inner: GovernorRateLimiter::keyed(quota) }
    }

    /// Blocks until the workspace's bucket has a free slot.
    pub async fn acquire(&self, workspace_id: Uuid) {
        loop {
            match self.inner.check_key(&workspace_id) {
                Ok(()) => return,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(DefaultClock::default().now());
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub fn try_acquire(&self, workspace_id: Uuid) -> bool {
        self.inner.check_key(&workspace_id).is_ok()
    }
}

pub type SharedRateLimiter = Arc<WorkspaceRateLimiter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_workspaces_have_independent_buckets() {
        let limiter = WorkspaceRateLimiter::new(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(limiter.try_acquire(a));
        assert!(limiter.try_acquire(b));
    }

    #[tokio::test]
    async fn exhausted_bucket_rejects_try_acquire() {
        let limiter = WorkspaceRateLimiter::new(1);
        let a = Uuid::new_v4();
        assert!(limiter.try_acquire(a));
        assert!(!limiter.try_acquire(a));
    }
}
