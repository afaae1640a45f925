//! Token-bucket rate limiter (§4.6), one per provider.
//!
//! Generalizes the teacher's sliding-window `middleware::rate_limit` (which
//! counts requests per fixed window) into the spec's continuous-refill
//! bucket: `tryConsume(n)` refills by `(now − lastRefill)·refillRate`
//! clamped to capacity, then deducts if sufficient.

use crate::clock::SharedClock;
use parking_lot::Mutex;
use std::time::Duration;

pub struct TokenBucketConfig {
    pub capacity: f64,
    pub refill_rate_per_sec: f64,
    /// Fraction (0..1) of capacity below which [`TokenBucket::near_empty`]
    /// reports true, used to induce a deliberate small smoothing delay.
    pub buffer: f64,
}

struct Inner {
    tokens: f64,
    last_refill_ms: i64,
}

/// A per-provider singleton; refill + consume happen under one short
/// critical section (§5 "mutated under a short critical section covering
/// refill + consume").
pub struct TokenBucket {
    config: TokenBucketConfig,
    clock: SharedClock,
    inner: Mutex<Inner>,
}

impl TokenBucket {
    pub fn new(config: TokenBucketConfig, clock: SharedClock) -> Self {
        let now_ms = clock.now().timestamp_millis();
        let capacity = config.capacity;
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                tokens: capacity,
                last_refill_ms: now_ms,
            }),
        }
    }

    fn refill_locked(&self, inner: &mut Inner) {
        let now_ms = self.clock.now().timestamp_millis();
        let elapsed_secs = ((now_ms - inner.last_refill_ms).max(0) as f64) / 1000.0;
        inner.tokens = (inner.tokens + elapsed_secs * self.config.refill_rate_per_sec)
            .min(self.config.capacity);
        inner.last_refill_ms = now_ms;
    }

    /// Refills, then deducts `n` tokens if sufficient. Returns whether the
    /// request is allowed.
    pub fn try_consume(&self, n: f64) -> bool {
        let mut inner = self.inner.lock();
        self.refill_locked(&mut inner);
        if inner.tokens >= n {
            inner.tokens -= n;
            true
        } else {
            false
        }
    }

    /// True when remaining tokens have fallen below `buffer` percent of
    /// capacity — callers use this to induce a small smoothing delay before
    /// the next request rather than bursting right up to the limit.
    pub fn near_empty(&self) -> bool {
        let mut inner = self.inner.lock();
        self.refill_locked(&mut inner);
        inner.tokens < self.config.capacity * self.config.buffer
    }

    pub fn smoothing_delay(&self) -> Duration {
        if self.near_empty() {
            Duration::from_millis(50)
        } else {
            Duration::ZERO
        }
    }
}
