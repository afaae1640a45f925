//! Consensus & fusion (§4.9): trust-weighted aggregation of surviving
//! signals into a single probability estimate with a confidence band and
//! disagreement index. Trust weight mirrors the teacher's order-book
//! depth-weighted mid-price calculation, with `baseWeight`/`perfAdjustment`/
//! `contextBonus` standing in for depth/staleness/side-imbalance factors.

use crate::config::SignalFusionConfig;
use crate::models::{AgentSignal, ConsensusProbability, ConsensusRegime, Direction};
use crate::performance::PerformanceTracker;

/// Ties default to YES (documented open-question resolution, DESIGN.md).
fn majority_direction(signals: &[AgentSignal]) -> Direction {
    let yes = signals.iter().filter(|s| s.direction == Direction::Yes).count();
    let no = signals.iter().filter(|s| s.direction == Direction::No).count();
    if yes >= no {
        Direction::Yes
    } else {
        Direction::No
    }
}

/// `w_a = baseWeight(a) · perfAdjustment(a) · (1 + contextBonus)` (§4.9),
/// clamped to non-negative since a large `conflictThreshold` could
/// otherwise drive the product negative.
fn trust_weight(signal: &AgentSignal, majority: Direction, config: &SignalFusionConfig, performance: &PerformanceTracker) -> f64 {
    let base = config.base_weight(&signal.agent_name);
    let perf = performance.perf_adjustment(&signal.agent_name);
    let context_bonus = if signal.direction == majority {
        config.alignment_bonus
    } else {
        -config.conflict_threshold
    };
    (base * perf * (1.0 + context_bonus)).max(0.0)
}

/// Degenerate consensus for the empty-signal case, used only when the graph
/// somehow reaches fusion with zero surviving signals (fan-in should have
/// already aborted via `InsufficientSignals` before this is called in
/// practice).
fn empty_consensus() -> ConsensusProbability {
    ConsensusProbability {
        point: 0.5,
        confidence_band: (0.0, 1.0),
        disagreement_index: 1.0,
        regime: ConsensusRegime::High,
        agent_count: 0,
    }
}

pub fn compute_consensus(signals: &[AgentSignal], config: &SignalFusionConfig, performance: &PerformanceTracker) -> ConsensusProbability {
    if signals.is_empty() {
        return empty_consensus();
    }

    let majority = majority_direction(signals);
    let weights: Vec<f64> = signals.iter().map(|s| trust_weight(s, majority, config, performance)).collect();
    let weight_sum: f64 = weights.iter().sum();

    let point = if weight_sum > 0.0 {
        signals.iter().zip(&weights).map(|(s, w)| s.fair_probability * w).sum::<f64>() / weight_sum
    } else {
        signals.iter().map(|s| s.fair_probability).sum::<f64>() / signals.len() as f64
    };

    let variance = if weight_sum > 0.0 {
        signals.iter().zip(&weights).map(|(s, w)| w * (s.fair_probability - point).powi(2)).sum::<f64>() / weight_sum
    } else {
        0.0
    };
    let sigma = variance.sqrt();

    let confidence_band = ((point - sigma).max(0.0), (point + sigma).min(1.0));
    let disagreement_index = (sigma / 0.5).min(1.0);
    let regime = ConsensusRegime::from_sigma(sigma);

    ConsensusProbability {
        point,
        confidence_band,
        disagreement_index,
        regime,
        agent_count: signals.len(),
    }
}
