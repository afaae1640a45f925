//! Cross-examination (§4.8): five deterministic rule-based tests applied to
//! each thesis against the surviving signal set and the MBD. No LLM call —
//! this stage is pure arithmetic/keyword logic, matching the teacher's
//! `signals::veto` rule layer that runs after detector fan-out.

use crate::agents::RISK_PHILOSOPHY_AGENT_NAME;
use crate::models::{survival_score, AgentSignal, DebateRecord, Direction, MarketBriefingDocument, TestName, TestOutcome, Verdict};

const EVIDENCE_CONFIDENCE_THRESHOLD: f64 = 0.6;
const TAIL_RISK_CONFIDENCE_THRESHOLD: f64 = 0.7;
const LIQUIDITY_SCORE_THRESHOLD: f64 = 5.0;
const LIQUIDITY_SPREAD_THRESHOLD: f64 = 5.0;

/// Keyword set marking a driver as describing a correlation rather than a
/// causal mechanism (§4.8 causality test).
const CORRELATION_KEYWORDS: &[&str] = &["correlat", "coincide", "tends to move with", "historically tracks", "in tandem with"];

pub fn run_cross_examination(bull: &[&AgentSignal], bear: &[&AgentSignal], all_signals: &[AgentSignal], mbd: &MarketBriefingDocument) -> DebateRecord {
    let bull_outcomes = evaluate_thesis(bull, all_signals, mbd, Direction::Yes);
    let bear_outcomes = evaluate_thesis(bear, all_signals, mbd, Direction::No);

    DebateRecord {
        bull_survival_score: survival_score(&bull_outcomes),
        bear_survival_score: survival_score(&bear_outcomes),
        bull_outcomes,
        bear_outcomes,
    }
}

fn evaluate_thesis(own: &[&AgentSignal], all_signals: &[AgentSignal], mbd: &MarketBriefingDocument, own_direction: Direction) -> Vec<TestOutcome> {
    vec![
        evidence_test(own),
        causality_test(own),
        timing_test(mbd),
        liquidity_test(mbd),
        tail_risk_test(all_signals, own_direction),
    ]
}

fn evidence_test(signals: &[&AgentSignal]) -> TestOutcome {
    let qualifying: Vec<&&AgentSignal> = signals.iter().filter(|s| s.confidence >= EVIDENCE_CONFIDENCE_THRESHOLD).collect();
    let mut distinct_drivers = std::collections::HashSet::new();
    for s in &qualifying {
        for driver in &s.key_drivers {
            distinct_drivers.insert(driver.as_str());
        }
    }
    let verdict = if qualifying.len() >= 2 && distinct_drivers.len() >= 2 {
        Verdict::Holds
    } else {
        Verdict::Weakens
    };
    TestOutcome {
        test: TestName::Evidence,
        verdict,
        justification: format!(
            "{} signals at confidence>={EVIDENCE_CONFIDENCE_THRESHOLD} citing {} distinct drivers",
            qualifying.len(),
            distinct_drivers.len()
        ),
    }
}

fn causality_test(signals: &[&AgentSignal]) -> TestOutcome {
    let drivers: Vec<&str> = signals.iter().flat_map(|s| s.key_drivers.iter().map(|d| d.as_str())).collect();
    if drivers.is_empty() {
        return TestOutcome {
            test: TestName::Causality,
            verdict: Verdict::Weakens,
            justification: "no supporting drivers to assess causality".to_string(),
        };
    }

    let correlation_only = drivers.iter().all(|d| {
        let lower = d.to_ascii_lowercase();
        CORRELATION_KEYWORDS.iter().any(|k| lower.contains(k))
    });

    let verdict = if correlation_only { Verdict::Weakens } else { Verdict::Holds };
    TestOutcome {
        test: TestName::Causality,
        verdict,
        justification: if correlation_only {
            "all supporting drivers describe correlation, not causal mechanism".to_string()
        } else {
            "at least one driver describes a causal mechanism".to_string()
        },
    }
}

fn timing_test(mbd: &MarketBriefingDocument) -> TestOutcome {
    if mbd.metadata.key_catalysts.is_empty() {
        return TestOutcome {
            test: TestName::Timing,
            verdict: Verdict::Weakens,
            justification: "no key catalysts identified".to_string(),
        };
    }

    let verdict = if mbd.metadata.key_catalysts.iter().any(|c| c.timestamp <= mbd.expiry_timestamp) {
        Verdict::Holds
    } else {
        Verdict::Refuted
    };
    TestOutcome {
        test: TestName::Timing,
        verdict,
        justification: "checked key catalyst timestamps against expiry".to_string(),
    }
}

fn liquidity_test(mbd: &MarketBriefingDocument) -> TestOutcome {
    let verdict = if mbd.liquidity_score >= LIQUIDITY_SCORE_THRESHOLD && mbd.bid_ask_spread <= LIQUIDITY_SPREAD_THRESHOLD {
        Verdict::Holds
    } else {
        Verdict::Weakens
    };
    TestOutcome {
        test: TestName::Liquidity,
        verdict,
        justification: format!(
            "liquidity_score={:.2} (need >= {LIQUIDITY_SCORE_THRESHOLD}), bid_ask_spread={:.2} (need <= {LIQUIDITY_SPREAD_THRESHOLD})",
            mbd.liquidity_score, mbd.bid_ask_spread
        ),
    }
}

fn tail_risk_test(all_signals: &[AgentSignal], own_direction: Direction) -> TestOutcome {
    let opposes = all_signals.iter().find(|s| s.agent_name == RISK_PHILOSOPHY_AGENT_NAME).is_some_and(|s| {
        s.direction != own_direction && s.direction != Direction::Neutral && s.confidence >= TAIL_RISK_CONFIDENCE_THRESHOLD
    });

    let verdict = if opposes { Verdict::Weakens } else { Verdict::Holds };
    TestOutcome {
        test: TestName::TailRisk,
        verdict,
        justification: if opposes {
            format!("risk_philosophy agent opposes at confidence>={TAIL_RISK_CONFIDENCE_THRESHOLD}")
        } else {
            "no high-confidence opposing risk_philosophy signal".to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::sample_mbd;
    use crate::models::KeyCatalyst;
    use chrono::{Duration, Utc};

    fn signal(agent: &str, direction: Direction, confidence: f64, drivers: Vec<&str>) -> AgentSignal {
        AgentSignal {
            agent_name: agent.to_string(),
            timestamp: Utc::now(),
            confidence,
            direction,
            fair_probability: if direction == Direction::Yes { 0.7 } else { 0.3 },
            key_drivers: drivers.into_iter().map(|d| d.to_string()).collect(),
            risk_factors: vec![],
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn evidence_holds_with_two_distinct_high_confidence_drivers() {
        let signals = vec![signal("a", Direction::Yes, 0.7, vec!["driver one"]), signal("b", Direction::Yes, 0.8, vec!["driver two"])];
        let refs: Vec<&AgentSignal> = signals.iter().collect();
        let outcome = evidence_test(&refs);
        assert_eq!(outcome.verdict, Verdict::Holds);
    }

    #[test]
    fn evidence_weakens_with_single_qualifying_signal() {
        let signals = vec![signal("a", Direction::Yes, 0.7, vec!["driver one"])];
        let refs: Vec<&AgentSignal> = signals.iter().collect();
        let outcome = evidence_test(&refs);
        assert_eq!(outcome.verdict, Verdict::Weakens);
    }

    #[test]
    fn causality_weakens_when_all_drivers_correlation_only() {
        let signals = vec![signal("a", Direction::Yes, 0.7, vec!["historically tracks turnout"])];
        let refs: Vec<&AgentSignal> = signals.iter().collect();
        let outcome = causality_test(&refs);
        assert_eq!(outcome.verdict, Verdict::Weakens);
    }

    #[test]
    fn causality_holds_with_a_non_correlation_driver() {
        let signals = vec![signal("a", Direction::Yes, 0.7, vec!["policy enacted directly shifts payout"])];
        let refs: Vec<&AgentSignal> = signals.iter().collect();
        let outcome = causality_test(&refs);
        assert_eq!(outcome.verdict, Verdict::Holds);
    }

    #[test]
    fn timing_holds_with_catalyst_before_expiry() {
        let mut mbd = sample_mbd();
        mbd.metadata.key_catalysts = vec![KeyCatalyst {
            event: "debate".to_string(),
            timestamp: mbd.expiry_timestamp - Duration::days(1),
        }];
        assert_eq!(timing_test(&mbd).verdict, Verdict::Holds);
    }

    #[test]
    fn timing_refuted_when_only_catalyst_is_after_expiry() {
        let mut mbd = sample_mbd();
        mbd.metadata.key_catalysts = vec![KeyCatalyst {
            event: "runoff".to_string(),
            timestamp: mbd.expiry_timestamp + Duration::days(1),
        }];
        assert_eq!(timing_test(&mbd).verdict, Verdict::Refuted);
    }

    #[test]
    fn liquidity_holds_above_thresholds() {
        let mut mbd = sample_mbd();
        mbd.liquidity_score = 6.0;
        mbd.bid_ask_spread = 2.0;
        assert_eq!(liquidity_test(&mbd).verdict, Verdict::Holds);
    }

    #[test]
    fn liquidity_weakens_on_wide_spread() {
        let mut mbd = sample_mbd();
        mbd.liquidity_score = 6.0;
        mbd.bid_ask_spread = 9.0;
        assert_eq!(liquidity_test(&mbd).verdict, Verdict::Weakens);
    }

    #[test]
    fn tail_risk_weakens_on_opposing_high_confidence_risk_philosophy_signal() {
        let all_signals = vec![signal(RISK_PHILOSOPHY_AGENT_NAME, Direction::No, 0.8, vec!["base rate reversion"])];
        let outcome = tail_risk_test(&all_signals, Direction::Yes);
        assert_eq!(outcome.verdict, Verdict::Weakens);
    }

    #[test]
    fn tail_risk_holds_when_risk_philosophy_agrees_or_is_absent() {
        let all_signals = vec![signal(RISK_PHILOSOPHY_AGENT_NAME, Direction::Yes, 0.8, vec!["aligned"])];
        assert_eq!(tail_risk_test(&all_signals, Direction::Yes).verdict, Verdict::Holds);
        assert_eq!(tail_risk_test(&[], Direction::Yes).verdict, Verdict::Holds);
    }
}
