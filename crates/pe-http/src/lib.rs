//! HTTP substrate shared by every collector: a configured client per source
//! family, per-host rate limiting, and retry/backoff over the transient
//! error classes (§4.1, §9).

pub mod client;
pub mod rate_limiter;

pub use client::{HttpSubstrate, NoopInspector, ResponseInspector};
pub use rate_limiter::HostRateLimiter;
