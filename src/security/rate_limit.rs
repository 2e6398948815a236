//! Per-client rate limiting.
//!
//! # Design Decisions
//! - Token bucket per client IP, refilled continuously
//! - In-process only; no shared state across gateway replicas
//! - Buckets are created on first sight of a client

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Keyed rate limiter for inbound clients.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    refill_rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            refill_rate: f64::from(cfg.requests_per_second),
            capacity: f64::from(cfg.burst_size.max(1)),
        }
    }

    /// Whether `key` may make one more request right now.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_acquire(self.capacity, self.refill_rate)
    }
}
