//! Monitor scheduler (§4.11, §5): `start | stop | triggerNow | nextRun |
//! running`. Cycles are non-overlapping via an `is_executing` guard under
//! the same `AtomicBool`-driven start/stop shape the teacher uses for its
//! ingest threads (`src/scrapers/binance_hardened_ingest.rs`), adapted from
//! a dedicated OS thread to a `tokio::spawn`'d task since a cycle is
//! IO-bound, not CPU-bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::graph::GraphDeps;

use super::cycle::{run_cycle, CycleReport};
use super::quota::{spawn_quota_reset_task, QuotaManager};

pub struct Monitor {
    deps: Arc<GraphDeps>,
    quota: Arc<QuotaManager>,
    interval_ms: u64,
    running: Arc<AtomicBool>,
    is_executing: Arc<AtomicBool>,
    next_run: Arc<Mutex<Option<DateTime<Utc>>>>,
    trigger: Arc<Notify>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    current_cycle: Arc<Mutex<Option<JoinHandle<()>>>>,
    quota_reset_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(deps: Arc<GraphDeps>, quota: Arc<QuotaManager>, interval_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            deps,
            quota,
            interval_ms,
            running: Arc::new(AtomicBool::new(false)),
            is_executing: Arc::new(AtomicBool::new(false)),
            next_run: Arc::new(Mutex::new(None)),
            trigger: Arc::new(Notify::new()),
            loop_handle: Mutex::new(None),
            current_cycle: Arc::new(Mutex::new(None)),
            quota_reset_handle: Mutex::new(None),
        })
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.lock()
    }

    /// Wakes the scheduler to run a cycle immediately instead of waiting for
    /// the next tick. If a cycle is already in flight, the notification
    /// persists and fires the next cycle back-to-back once it finishes.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Runs one cycle immediately, then schedules recurring runs every
    /// `interval_ms`. A second `start()` while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.loop_handle.lock();
        if handle.is_some() {
            tracing::warn!("monitor already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        // The reset task's cadence is wall-clock midnight regardless of any
        // `FakeClock` a test may have wired into the `QuotaManager` itself.
        let quota_reset = spawn_quota_reset_task(self.quota.clone(), Arc::new(crate::clock::SystemClock));
        *self.quota_reset_handle.lock() = Some(quota_reset);

        let this = self.clone();
        *handle = Some(tokio::spawn(async move { this.run_loop().await }));
    }

    /// Graceful: clears the timer, then waits until any in-flight cycle
    /// finishes before returning.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.trigger.notify_one();

        if let Some(handle) = self.loop_handle.lock().take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.current_cycle.lock().take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.quota_reset_handle.lock().take() {
            handle.abort();
        }
    }

    async fn run_loop(self: Arc<Self>) {
        self.spawn_cycle();

        let mut interval = tokio::time::interval(Duration::from_millis(self.interval_ms.max(1)));
        interval.tick().await; // the first tick fires immediately; `spawn_cycle` above already covers it

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.trigger.notified() => {}
            }
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            self.spawn_cycle();
        }
    }

    fn spawn_cycle(self: &Arc<Self>) {
        if self.is_executing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            tracing::warn!("cycle tick dropped: previous cycle still executing");
            return;
        }
        *self.next_run.lock() = Some(Utc::now() + chrono::Duration::milliseconds(self.interval_ms as i64));

        let deps = self.deps.clone();
        let quota = self.quota.clone();
        let is_executing = self.is_executing.clone();
        let handle = tokio::spawn(async move {
            let outcome: anyhow::Result<CycleReport> = run_cycle(&deps, &quota).await;
            is_executing.store(false, Ordering::SeqCst);
            match outcome {
                Ok(report) => tracing::info!(
                    discovered = report.discovered,
                    refreshed = report.refreshed,
                    resolved_skipped = report.resolved_skipped,
                    errors = report.errors,
                    "monitor cycle complete"
                ),
                Err(err) => tracing::error!(error = %err, "monitor cycle failed"),
            }
        });
        *self.current_cycle.lock() = Some(handle);
    }
}
