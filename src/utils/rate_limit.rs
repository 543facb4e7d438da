//! Keyed token-bucket rate limiter.
//!
//! Used by the HTTP control plane to throttle event ingestion per client.
//! Refill is computed lazily from the elapsed time on each `take`, so no
//! background task is needed.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    /// Seconds since the epoch at the last refill.
    last: f64,
}

/// Per-key token buckets with a shared capacity and refill rate.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    buckets: DashMap<String, Bucket>,
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            buckets: DashMap::new(),
        }
    }

    /// Try to take `tokens` from the bucket for `key`. Returns false when the
    /// bucket is exhausted.
    pub fn take(&self, key: &str, tokens: f64) -> bool {
        self.take_at(key, tokens, wall_clock_secs())
    }

    /// Clock-injected variant of [`take`](Self::take).
    pub fn take_at(&self, key: &str, tokens: f64, now_secs: f64) -> bool {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last: now_secs,
        });

        let elapsed = (now_secs - bucket.last).max(0.0);
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last = now_secs;

        if bucket.tokens < tokens {
            return false;
        }
        bucket.tokens -= tokens;
        true
    }

    /// Current token count for `key` (capacity for keys never seen).
    pub fn inspect(&self, key: &str) -> (f64, f64) {
        let tokens = self
            .buckets
            .get(key)
            .map(|b| b.tokens)
            .unwrap_or(self.capacity);
        (tokens, self.capacity)
    }
}
