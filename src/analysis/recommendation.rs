//! Recommendation (§4.10): the terminal artifact of a graph run. Pure
//! arithmetic over the consensus probability, the MBD, and the surviving
//! bull/bear theses — no IO, which keeps it trivially unit-testable against
//! the literal scenario numbers in §8.

use crate::config::ConsensusConfig;
use crate::models::{ConsensusProbability, Explanation, LiquidityRisk, MarketBriefingDocument, RecommendationMetadata, Thesis, TradeAction, TradeRecommendation};

pub fn build_recommendation(consensus: &ConsensusProbability, mbd: &MarketBriefingDocument, bull: &Thesis, bear: &Thesis, config: &ConsensusConfig) -> TradeRecommendation {
    let edge = consensus.point - mbd.current_probability;

    let action = if edge.abs() < config.min_edge_threshold {
        TradeAction::NoTrade
    } else if edge > 0.0 {
        TradeAction::LongYes
    } else {
        TradeAction::LongNo
    };

    let expected_value = if mbd.current_probability.abs() > f64::EPSILON {
        edge / mbd.current_probability
    } else {
        0.0
    };

    // bidAskSpread is in cents (§3); half of it in probability units bounds
    // the entry zone around the current quote.
    let half_spread = mbd.bid_ask_spread / 200.0;
    let entry_zone = ((mbd.current_probability - half_spread).max(0.0), (mbd.current_probability + half_spread).min(1.0));

    let target_zone = match action {
        TradeAction::NoTrade => None,
        _ => Some(consensus.confidence_band),
    };

    let liquidity_risk = LiquidityRisk::from_liquidity_score(mbd.liquidity_score);

    let win_probability = match action {
        TradeAction::LongNo => 1.0 - consensus.point,
        _ => consensus.point,
    };

    let (winning, opposing) = match action {
        TradeAction::LongNo => (bear, bull),
        _ => (bull, bear),
    };

    let core_thesis = if winning.claims.is_empty() {
        "No dominant thesis survived cross-examination.".to_string()
    } else {
        winning.claims.join("; ")
    };

    let key_catalysts: Vec<String> = winning.key_catalysts.iter().map(|c| c.event.clone()).collect();
    let failure_scenarios = opposing.claims.clone();

    let uncertainty_note = (consensus.disagreement_index > config.high_disagreement_threshold).then(|| {
        format!(
            "Agent disagreement index {:.2} exceeds the {:.2} threshold; treat the consensus band as wide.",
            consensus.disagreement_index, config.high_disagreement_threshold
        )
    });

    let summary = match action {
        TradeAction::LongYes => format!(
            "Consensus probability {:.3} exceeds market {:.3} by {:.3}; long YES.",
            consensus.point, mbd.current_probability, edge
        ),
        TradeAction::LongNo => format!(
            "Consensus probability {:.3} trails market {:.3} by {:.3}; long NO.",
            consensus.point, mbd.current_probability, edge
        ),
        TradeAction::NoTrade => format!("Edge {:.3} is within the {:.3} no-trade band.", edge, config.min_edge_threshold),
    };

    TradeRecommendation {
        action,
        expected_value,
        win_probability,
        entry_zone,
        target_zone,
        liquidity_risk,
        explanation: Explanation {
            summary,
            core_thesis,
            key_catalysts,
            failure_scenarios,
            uncertainty_note,
        },
        metadata: RecommendationMetadata {
            market_probability: mbd.current_probability,
            consensus_probability: consensus.point,
            edge,
            confidence_band: consensus.confidence_band,
            disagreement_index: Some(consensus.disagreement_index),
            agent_count: consensus.agent_count,
        },
    }
}
