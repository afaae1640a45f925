use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    LongYes,
    LongNo,
    NoTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityRisk {
    Low,
    Medium,
    High,
}

impl LiquidityRisk {
    pub fn from_liquidity_score(score: f64) -> Self {
        if score >= 7.0 {
            LiquidityRisk::Low
        } else if score >= 4.0 {
            LiquidityRisk::Medium
        } else {
            LiquidityRisk::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub core_thesis: String,
    pub key_catalysts: Vec<String>,
    pub failure_scenarios: Vec<String>,
    pub uncertainty_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationMetadata {
    pub market_probability: f64,
    pub consensus_probability: f64,
    pub edge: f64,
    pub confidence_band: (f64, f64),
    pub disagreement_index: Option<f64>,
    pub agent_count: usize,
}

/// Terminal artifact of a graph run (§3, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecommendation {
    pub action: TradeAction,
    pub expected_value: f64,
    pub win_probability: f64,
    pub entry_zone: (f64, f64),
    pub target_zone: Option<(f64, f64)>,
    pub liquidity_risk: LiquidityRisk,
    pub explanation: Explanation,
    pub metadata: RecommendationMetadata,
}
