use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusRegime {
    Low,
    Mid,
    High,
}

impl ConsensusRegime {
    /// Regime by sigma thresholds (§4.9). Open question in §9 resolved here:
    /// thresholds are symmetric with the volatility-regime spread buckets,
    /// scaled to a probability-space sigma (documented in DESIGN.md).
    pub fn from_sigma(sigma: f64) -> Self {
        if sigma < 0.05 {
            ConsensusRegime::Low
        } else if sigma < 0.12 {
            ConsensusRegime::Mid
        } else {
            ConsensusRegime::High
        }
    }
}

/// Fused probability estimate (§3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusProbability {
    pub point: f64,
    pub confidence_band: (f64, f64),
    pub disagreement_index: f64,
    pub regime: ConsensusRegime,
    pub agent_count: usize,
}
