use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Holds,
    Weakens,
    Refuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestName {
    Evidence,
    Causality,
    Timing,
    Liquidity,
    TailRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test: TestName,
    pub verdict: Verdict,
    pub justification: String,
}

/// Output of cross-examination (§3, §4.8): one set of test outcomes and a
/// survival score per thesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRecord {
    pub bull_outcomes: Vec<TestOutcome>,
    pub bear_outcomes: Vec<TestOutcome>,
    pub bull_survival_score: f64,
    pub bear_survival_score: f64,
}

pub fn survival_score(outcomes: &[TestOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let holds = outcomes.iter().filter(|o| o.verdict == Verdict::Holds).count();
    holds as f64 / outcomes.len() as f64
}
