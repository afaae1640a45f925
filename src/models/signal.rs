use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Yes,
    No,
    Neutral,
}

impl Direction {
    /// YES iff >0.5, NO iff <0.5, NEUTRAL otherwise — except when explicitly
    /// justified by low confidence (§3 Agent Signal invariant).
    pub fn from_probability(fair_probability: f64) -> Self {
        if fair_probability > 0.5 {
            Direction::Yes
        } else if fair_probability < 0.5 {
            Direction::No
        } else {
            Direction::Neutral
        }
    }

    /// Checks the direction/probability consistency invariant, allowing the
    /// NEUTRAL exception when confidence is below `low_confidence_threshold`.
    pub fn is_consistent(self, fair_probability: f64, confidence: f64, low_confidence_threshold: f64) -> bool {
        let expected = Self::from_probability(fair_probability);
        if self == expected {
            return true;
        }
        self == Direction::Neutral && confidence < low_confidence_threshold
    }
}

/// One agent's probabilistic signal (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSignal {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub direction: Direction,
    pub fair_probability: f64,
    pub key_drivers: Vec<String>,
    pub risk_factors: Vec<String>,
    pub metadata: serde_json::Value,
}

impl AgentSignal {
    /// Property 3: confidence/fairProbability in [0,1], 1..=5 key drivers,
    /// direction consistent with probability.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
            && (0.0..=1.0).contains(&self.fair_probability)
            && !self.key_drivers.is_empty()
            && self.key_drivers.len() <= 5
            && self.direction.is_consistent(self.fair_probability, self.confidence, 0.4)
    }
}
