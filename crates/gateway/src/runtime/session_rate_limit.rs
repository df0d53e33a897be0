//! Per-session turn-rate limiting (§5/§6): independent of the per-IP token
//! bucket `tower_governor` enforces at the HTTP layer, this guards against a
//! single session issuing turns faster than one at a time can reasonably
//! complete — e.g. a misbehaving client retrying into an open SSE stream.
//!
//! A plain token bucket per session id, refilled lazily on `check` rather
//! than by a background task. Grounded on `QuotaTracker`'s lazy-reset shape
//! (`runtime/quota.rs`): no ticker, just a timestamp compared at call time.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use sa_domain::config::RateLimitConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket keyed by session id. `requests_per_second` sets the refill
/// rate, `burst_size` the bucket capacity — the same two knobs
/// `ServerConfig.rate_limit` uses for the per-IP limiter, so operators only
/// have one rate-limiting vocabulary to reason about.
pub struct SessionRateLimiter {
    rate_per_sec: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl SessionRateLimiter {
    pub fn new(rate_per_sec: u32, capacity: u32) -> Self {
        Self {
            rate_per_sec: rate_per_sec.max(1) as f64,
            capacity: capacity.max(1) as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: Option<&RateLimitConfig>) -> Self {
        match cfg {
            Some(rl) => Self::new(rl.requests_per_second, rl.burst_size),
            // No [server.rate_limit] configured — generous default so the
            // limiter never becomes the bottleneck in dev/test setups.
            None => Self::new(100, 200),
        }
    }

    /// Consume one token for `session_id`. Returns `false` when the bucket
    /// is empty — the caller should reject the turn with `RateLimited`.
    pub fn check(&self, session_id: &str) -> bool {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(session_id.to_owned()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop bucket entries untouched for a while, bounding memory growth
    /// across long-lived deployments with many distinct session ids.
    pub fn prune_idle(&self, idle_for_secs: u64) {
        let now = Instant::now();
        self.buckets
            .lock()
            .retain(|_, b| now.duration_since(b.last_refill).as_secs() < idle_for_secs);
    }
}
