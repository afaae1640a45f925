//! Performance tracking (§4.12): per-agent singleton metrics, updated
//! serially within a process (§5 "performance-metric updates for a single
//! agent are serialized"), matching the teacher's single-writer-per-symbol
//! discipline in `performance::latency` but keyed by agent name instead of
//! instrument. Durable `AgentPerformanceMetrics` live in memory here and
//! round-trip through persistence; process-local counters/histograms also
//! go out through the `metrics` facade the teacher's own `performance`
//! module re-exports, so an operator can scrape per-agent rates the same
//! way they'd scrape the teacher's latency gauges.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::SharedClock;
use crate::config::PerformanceTrackingConfig;
use crate::models::{brier_accuracy, AgentPerformanceMetrics};

/// EMA smoothing factor for `accuracyScore` updates on resolution (§4.12).
const ACCURACY_EMA_FACTOR: f64 = 0.1;

struct TrackerEntry {
    metrics: AgentPerformanceMetrics,
    total_attempts: u64,
}

impl TrackerEntry {
    fn neutral(agent_name: &str) -> Self {
        Self {
            metrics: AgentPerformanceMetrics::neutral(agent_name),
            total_attempts: 0,
        }
    }

    fn recompute_error_rate(&mut self) {
        self.metrics.error_rate = if self.total_attempts == 0 {
            0.0
        } else {
            let failures = self.total_attempts - self.metrics.total_analyses;
            failures as f64 / self.total_attempts as f64
        };
    }
}

pub struct PerformanceTracker {
    clock: SharedClock,
    enabled: bool,
    min_sample_size: u32,
    entries: Mutex<HashMap<String, TrackerEntry>>,
}

impl PerformanceTracker {
    pub fn new(clock: SharedClock, config: &PerformanceTrackingConfig) -> Self {
        Self {
            clock,
            enabled: config.enabled,
            min_sample_size: config.min_sample_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Cumulative-mean update of `averageConfidence`/`averageExecutionTime`,
    /// and `totalAnalyses` increment, on a successful invocation.
    pub fn record_success(&self, agent_name: &str, confidence: f64, duration: Duration) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock();
        let entry = entries.entry(agent_name.to_string()).or_insert_with(|| TrackerEntry::neutral(agent_name));

        let n = entry.metrics.total_analyses as f64;
        entry.metrics.average_confidence = (entry.metrics.average_confidence * n + confidence) / (n + 1.0);
        entry.metrics.average_execution_time_ms =
            (entry.metrics.average_execution_time_ms * n + duration.as_millis() as f64) / (n + 1.0);
        entry.metrics.total_analyses += 1;
        entry.total_attempts += 1;
        entry.recompute_error_rate();
        entry.metrics.last_updated = self.clock.now();

        metrics::counter!("agent_analyses_total", "agent" => agent_name.to_string()).increment(1);
        metrics::histogram!("agent_execution_time_ms", "agent" => agent_name.to_string()).record(duration.as_millis() as f64);
    }

    /// A failed/timed-out invocation counts toward `errorRate` but not
    /// `totalAnalyses` (§4.12: totalAnalyses increments "on each successful
    /// agent execution").
    pub fn record_failure(&self, agent_name: &str) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock();
        let entry = entries.entry(agent_name.to_string()).or_insert_with(|| TrackerEntry::neutral(agent_name));
        entry.total_attempts += 1;
        entry.recompute_error_rate();
        entry.metrics.last_updated = self.clock.now();

        metrics::counter!("agent_failures_total", "agent" => agent_name.to_string()).increment(1);
    }

    /// Brier-score EMA update on market resolution (§4.12): `accuracy_new =
    /// 0.1·sampleAccuracy + 0.9·accuracy_prev`. `predicted_probability` is
    /// the agent's own `fairProbability` from its signal on this market.
    pub fn record_resolution(&self, agent_name: &str, predicted_probability: f64, actual_outcome_is_yes: bool) {
        if !self.enabled {
            return;
        }
        let sample_accuracy = brier_accuracy(predicted_probability, actual_outcome_is_yes);
        let mut entries = self.entries.lock();
        let entry = entries.entry(agent_name.to_string()).or_insert_with(|| TrackerEntry::neutral(agent_name));
        entry.metrics.accuracy_score = ACCURACY_EMA_FACTOR * sample_accuracy + (1.0 - ACCURACY_EMA_FACTOR) * entry.metrics.accuracy_score;
        entry.metrics.last_updated = self.clock.now();
    }

    pub fn get(&self, agent_name: &str) -> AgentPerformanceMetrics {
        self.entries
            .lock()
            .get(agent_name)
            .map(|e| e.metrics.clone())
            .unwrap_or_else(|| AgentPerformanceMetrics::neutral(agent_name))
    }

    /// `perfAdjustment(a) = 0.5 + accuracy(a)` clipped to `[0.5, 1.5]` (§4.9),
    /// applied only when `totalAnalyses ≥ minSampleSize` and tracking is
    /// enabled; otherwise neutral (1.0).
    pub fn perf_adjustment(&self, agent_name: &str) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let entries = self.entries.lock();
        match entries.get(agent_name) {
            Some(entry) if entry.metrics.total_analyses as u32 >= self.min_sample_size => (0.5 + entry.metrics.accuracy_score).clamp(0.5, 1.5),
            _ => 1.0,
        }
    }

    /// Filters by `totalAnalyses ≥ minSampleSize`, sorted by `accuracyScore`
    /// descending (§4.12).
    pub fn leaderboard(&self) -> Vec<AgentPerformanceMetrics> {
        let entries = self.entries.lock();
        let mut rows: Vec<AgentPerformanceMetrics> = entries
            .values()
            .filter(|e| e.metrics.total_analyses as u32 >= self.min_sample_size)
            .map(|e| e.metrics.clone())
            .collect();
        rows.sort_by(|a, b| b.accuracy_score.partial_cmp(&a.accuracy_score).unwrap_or(std::cmp::Ordering::Equal));
        rows
    }

    /// Loads a durable snapshot (e.g. from persistence) as this process's
    /// starting state, preserving `total_attempts` as `total_analyses`
    /// scaled by `(1 - errorRate)` rounded — best-effort, since the durable
    /// record doesn't carry the raw attempt count.
    pub fn seed(&self, metrics: AgentPerformanceMetrics) {
        let mut entries = self.entries.lock();
        let total_attempts = if metrics.error_rate < 1.0 {
            (metrics.total_analyses as f64 / (1.0 - metrics.error_rate).max(1e-6)).round() as u64
        } else {
            metrics.total_analyses
        };
        entries.insert(metrics.agent_name.clone(), TrackerEntry { metrics, total_attempts });
    }
}
