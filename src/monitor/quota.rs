//! Daily quota manager (§4.11): tracks markets analyzed today against
//! `rateLimit.dailyQuota` and resets at UTC midnight, then every 24h.
//! Mirrors the teacher's token-bucket/rate-limit accounting
//! (`src/external/token_bucket.rs`) but on a calendar-day cadence instead of
//! a rolling window.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::clock::SharedClock;

pub struct QuotaManager {
    daily_quota: u32,
    used_today: Mutex<u32>,
    clock: SharedClock,
}

impl QuotaManager {
    pub fn new(daily_quota: u32, clock: SharedClock) -> Self {
        Self {
            daily_quota,
            used_today: Mutex::new(0),
            clock,
        }
    }

    pub fn record_usage(&self, count: u32) {
        let mut used = self.used_today.lock();
        *used = used.saturating_add(count);
    }

    pub fn remaining(&self) -> u32 {
        self.daily_quota.saturating_sub(*self.used_today.lock())
    }

    pub fn reset_usage(&self) {
        *self.used_today.lock() = 0;
        tracing::info!("daily quota reset");
    }

    /// Budget for one cycle: never more than what the quota has left, and
    /// never more than `max_markets_per_cycle`.
    pub fn recommend_max_markets(&self, max_markets_per_cycle: usize) -> usize {
        (self.remaining() as usize).min(max_markets_per_cycle)
    }
}

fn duration_until_next_midnight(clock: &SharedClock) -> Duration {
    let now = clock.now();
    let next_midnight = (now.date_naive() + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).expect("valid midnight").and_utc();
    (next_midnight - now).to_std().unwrap_or(Duration::from_secs(1))
}

/// Sleeps until the next UTC midnight, resets, then sleeps a further 24h on
/// every subsequent iteration — recomputed from the clock each pass so the
/// task self-corrects rather than drifting.
pub fn spawn_quota_reset_task(quota: Arc<QuotaManager>, clock: SharedClock) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let sleep_for = duration_until_next_midnight(&clock);
            tokio::time::sleep(sleep_for).await;
            quota.reset_usage();
        }
    })
}
