//! Per-host token-bucket rate limiting (§9 "Rate limiting").
//!
//! The original SEC-only crawler kept a single global [`governor::RateLimiter`].
//! Collectors here talk to nine different hosts with wildly different
//! tolerances — SEC EDGAR, a LinkedIn-adjacent bio source, news APIs — so
//! the limiter is keyed by host and each bucket is created lazily on first
//! use from a per-host override or the configured default rate.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovernorLimiter};
use tracing::debug;

type Limiter = GovernorLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate limiter holding one token bucket per host.
#[derive(Debug)]
pub struct HostRateLimiter {
    default_per_second: f64,
    overrides: HashMap<String, f64>,
    buckets: DashMap<String, Arc<Limiter>>,
}

impl HostRateLimiter {
    pub fn new(default_per_second: f64) -> Self {
        Self {
            default_per_second,
            overrides: HashMap::new(),
            buckets: DashMap::new(),
        }
    }

    pub fn with_overrides(default_per_second: f64, overrides: HashMap<String, f64>) -> Self {
        Self {
            default_per_second,
            overrides,
            buckets: DashMap::new(),
        }
    }

    fn rate_for(&self, host: &str) -> f64 {
        self.overrides
            .get(host)
            .copied()
            .unwrap_or(self.default_per_second)
    }

    fn bucket_for(&self, host: &str) -> Arc<Limiter> {
        if let Some(existing) = self.buckets.get(host) {
            return existing.clone();
        }

        let rate = self.rate_for(host).max(0.01);
        let quota = quota_from_per_second(rate);
        let limiter = Arc::new(GovernorLimiter::direct(quota));
        self.buckets.insert(host.to_string(), limiter.clone());
        limiter
    }

    /// Blocks until a permit for `host` is available.
    pub async fn wait_for_permit(&self, host: &str) {
        let limiter = self.bucket_for(host);
        loop {
            match limiter.check() {
                Ok(_) => {
                    debug!(host, "rate limit permit granted");
                    return;
                }
                Err(not_until) => {
                    let wait = not_until
                        .wait_time_from(governor::clock::DefaultClock::default().now());
                    if wait > Duration::ZERO {
                        debug!(host, ?wait, "rate limited, sleeping");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }

    /// Non-blocking permit check; returns the wait duration on failure.
    pub fn try_permit(&self, host: &str) -> Result<(), Duration> {
        let limiter = self.bucket_for(host);
        limiter.check().map_err(|not_until| {
            not_until.wait_time_from(governor::clock::DefaultClock::default().now())
        })
    }
}

fn quota_from_per_second(per_second: f64) -> Quota {
    if per_second >= 1.0 {
        let n = NonZeroU32::new(per_second.round() as u32).unwrap_or(NonZeroU32::new(1).unwrap());
        Quota::per_second(n)
    } else {
        let period = Duration::from_secs_f64(1.0 / per_second);
        Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn default_rate_applies_to_unknown_hosts() {
        let limiter = HostRateLimiter::new(100.0);
        let start = Instant::now();
        limiter.wait_for_permit("sec.gov").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn per_host_override_is_independent_of_default() {
        let mut overrides = HashMap::new();
        overrides.insert("slow.example.com".to_string(), 1.0);
        let limiter = HostRateLimiter::with_overrides(100.0, overrides);

        limiter.wait_for_permit("slow.example.com").await;
        let start = Instant::now();
        limiter.wait_for_permit("slow.example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(400));

        // A different host is unaffected by slow.example.com's bucket.
        let start = Instant::now();
        limiter.wait_for_permit("fast.example.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn try_permit_reports_wait_on_exhaustion() {
        let limiter = HostRateLimiter::new(1.0);
        assert!(limiter.try_permit("host").is_ok());
        assert!(limiter.try_permit("host").is_err());
    }
}
