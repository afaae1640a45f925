//! Thesis construction (§4.7): from surviving signals, build one bull and
//! one bear argument. Mirrors the teacher's "group by outcome, then
//! aggregate with a trust weight" shape used for order-book side
//! aggregation, generalized from price levels to agent signals.

use crate::config::SignalFusionConfig;
use crate::models::{AgentSignal, Direction, MarketBriefingDocument, Thesis};
use crate::performance::PerformanceTracker;

/// Top-k distinct driver/assumption strings kept per thesis.
const MAX_CLAIMS: usize = 5;
const MAX_ASSUMPTIONS: usize = 5;

pub struct ThesisPair {
    pub bull: Thesis,
    pub bear: Thesis,
}

/// Builds the bull/bear pair (§4.7): signals whose direction aligns with
/// YES vs NO and whose confidence clears `confidence_threshold` contribute
/// to the corresponding thesis.
pub fn construct_theses(
    signals: &[AgentSignal],
    mbd: &MarketBriefingDocument,
    config: &SignalFusionConfig,
    performance: &PerformanceTracker,
    confidence_threshold: f64,
) -> ThesisPair {
    let bull_signals: Vec<&AgentSignal> = signals
        .iter()
        .filter(|s| s.direction == Direction::Yes && s.confidence >= confidence_threshold)
        .collect();
    let bear_signals: Vec<&AgentSignal> = signals
        .iter()
        .filter(|s| s.direction == Direction::No && s.confidence >= confidence_threshold)
        .collect();

    ThesisPair {
        bull: build_thesis(&bull_signals, mbd, config, performance),
        bear: build_thesis(&bear_signals, mbd, config, performance),
    }
}

fn build_thesis(signals: &[&AgentSignal], mbd: &MarketBriefingDocument, config: &SignalFusionConfig, performance: &PerformanceTracker) -> Thesis {
    if signals.is_empty() {
        return Thesis {
            claims: vec![],
            key_catalysts: mbd.metadata.key_catalysts.clone(),
            supporting_signals: vec![],
            assumptions: vec![],
            implied_probability: mbd.current_probability,
        };
    }

    let mut claims: Vec<String> = Vec::new();
    for s in signals {
        for driver in &s.key_drivers {
            if !claims.contains(driver) {
                claims.push(driver.clone());
            }
        }
    }
    claims.truncate(MAX_CLAIMS);

    let mut assumptions: Vec<String> = Vec::new();
    for s in signals {
        for factor in &s.risk_factors {
            if !assumptions.contains(factor) {
                assumptions.push(factor.clone());
            }
        }
    }
    assumptions.truncate(MAX_ASSUMPTIONS);

    let supporting_signals: Vec<String> = signals.iter().map(|s| s.agent_name.clone()).collect();

    // Pre-fusion weighting: baseWeight·perfAdjustment only. contextBonus
    // (§4.9) needs the cross-thesis majority direction, which isn't settled
    // until consensus fusion runs after thesis construction.
    let weights: Vec<f64> = signals
        .iter()
        .map(|s| config.base_weight(&s.agent_name) * performance.perf_adjustment(&s.agent_name))
        .collect();
    let weight_sum: f64 = weights.iter().sum();
    let implied_probability = if weight_sum > 0.0 {
        signals.iter().zip(&weights).map(|(s, w)| s.fair_probability * w).sum::<f64>() / weight_sum
    } else {
        signals.iter().map(|s| s.fair_probability).sum::<f64>() / signals.len() as f64
    };

    Thesis {
        claims,
        key_catalysts: mbd.metadata.key_catalysts.clone(),
        supporting_signals,
        assumptions,
        implied_probability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::PerformanceTrackingConfig;
    use crate::models::test_support::sample_mbd;
    use chrono::Utc;
    use std::sync::Arc;

    fn signal(agent: &str, direction: Direction, fair_probability: f64, confidence: f64) -> AgentSignal {
        AgentSignal {
            agent_name: agent.to_string(),
            timestamp: Utc::now(),
            confidence,
            direction,
            fair_probability,
            key_drivers: vec![format!("{agent}-driver")],
            risk_factors: vec![format!("{agent}-risk")],
            metadata: serde_json::Value::Null,
        }
    }

    fn tracker() -> PerformanceTracker {
        PerformanceTracker::new(
            Arc::new(SystemClock),
            &PerformanceTrackingConfig {
                enabled: true,
                evaluate_on_resolution: true,
                min_sample_size: 10,
            },
        )
    }

    #[test]
    fn splits_signals_by_direction_and_confidence_threshold() {
        let signals = vec![
            signal("a", Direction::Yes, 0.7, 0.8),
            signal("b", Direction::No, 0.3, 0.9),
            signal("c", Direction::Yes, 0.6, 0.2), // below threshold, excluded
        ];
        let mbd = sample_mbd();
        let config = SignalFusionConfig::default();
        let performance = tracker();
        let pair = construct_theses(&signals, &mbd, &config, &performance, 0.5);

        assert_eq!(pair.bull.supporting_signals, vec!["a".to_string()]);
        assert_eq!(pair.bear.supporting_signals, vec!["b".to_string()]);
    }

    #[test]
    fn empty_side_falls_back_to_market_probability() {
        let signals = vec![signal("a", Direction::Yes, 0.7, 0.8)];
        let mbd = sample_mbd();
        let config = SignalFusionConfig::default();
        let performance = tracker();
        let pair = construct_theses(&signals, &mbd, &config, &performance, 0.5);

        assert!(pair.bear.supporting_signals.is_empty());
        assert!((pair.bear.implied_probability - mbd.current_probability).abs() < 1e-9);
    }

    #[test]
    fn claims_are_deduped_and_capped() {
        let signals: Vec<AgentSignal> = (0..8)
            .map(|i| {
                let mut s = signal(&format!("agent{i}"), Direction::Yes, 0.7, 0.8);
                s.key_drivers = vec!["shared driver".to_string()];
                s
            })
            .collect();
        let mbd = sample_mbd();
        let config = SignalFusionConfig::default();
        let performance = tracker();
        let pair = construct_theses(&signals, &mbd, &config, &performance, 0.5);

        assert_eq!(pair.bull.claims.len(), 1);
    }
}
