//! Three-state circuit breaker (§4.6), generalized from the teacher's
//! endpoint-rotation breaker in `scrapers::binance_session`
//! (`circuit_breaker_threshold` / `circuit_breaker_cooldown_secs`) into the
//! spec's explicit closed → open → half-open → closed state machine.

use crate::clock::SharedClock;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at_ms: Option<i64>,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout_ms: i64,
    clock: SharedClock,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout_ms: u64, clock: SharedClock) -> Self {
        Self {
            failure_threshold,
            reset_timeout_ms: reset_timeout_ms as i64,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at_ms: None,
            }),
        }
    }

    /// Whether a call should be attempted right now. Transitions *open* →
    /// *half-open* lazily, on the caller's next permission check, once
    /// `reset_timeout_ms` has elapsed.
    pub fn permits_call(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let now_ms = self.clock.now().timestamp_millis();
                let opened_at = inner.opened_at_ms.unwrap_or(now_ms);
                if now_ms - opened_at >= self.reset_timeout_ms {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// A single success closes the breaker, whatever its prior state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at_ms = None;
    }

    /// A failure in half-open reopens immediately; in closed it counts
    /// toward `failure_threshold` consecutive failures before opening.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at_ms = Some(self.clock.now().timestamp_millis());
                inner.consecutive_failures = self.failure_threshold;
            }
            BreakerState::Closed | BreakerState::Open => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at_ms = Some(self.clock.now().timestamp_millis());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn opens_after_exact_failure_threshold() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let breaker = CircuitBreaker::new(5, 30_000, clock);
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.permits_call());
    }

    #[test]
    fn half_opens_after_reset_timeout_then_closes_on_success() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let breaker = CircuitBreaker::new(3, 10_000, clock.clone());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.permits_call());

        clock.advance(chrono::Duration::milliseconds(10_000));
        assert!(breaker.permits_call());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn failure_in_half_open_reopens() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let breaker = CircuitBreaker::new(2, 5_000, clock.clone());
        breaker.record_failure();
        breaker.record_failure();
        clock.advance(chrono::Duration::milliseconds(5_000));
        assert!(breaker.permits_call());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
