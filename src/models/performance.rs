use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable per-agent performance record (§3, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformanceMetrics {
    pub agent_name: String,
    pub total_analyses: u64,
    pub average_confidence: f64,
    pub accuracy_score: f64,
    pub average_execution_time_ms: f64,
    pub error_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl AgentPerformanceMetrics {
    /// Neutral accuracy for no-data states (property 12).
    pub fn neutral(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            total_analyses: 0,
            average_confidence: 0.0,
            accuracy_score: 0.5,
            average_execution_time_ms: 0.0,
            error_rate: 0.0,
            last_updated: Utc::now(),
        }
    }
}

/// Brier-score accuracy: `1 − (predicted − actual)²`. Perfect calibration
/// (predicting 1.0 for YES, 0.0 for NO) yields 1.0; anti-calibration yields
/// 0.0 (property 12).
pub fn brier_accuracy(predicted_probability: f64, actual_outcome_is_yes: bool) -> f64 {
    let actual = if actual_outcome_is_yes { 1.0 } else { 0.0 };
    let diff = predicted_probability - actual;
    1.0 - diff * diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_calibration_yields_one() {
        assert!((brier_accuracy(1.0, true) - 1.0).abs() < 1e-9);
        assert!((brier_accuracy(0.0, false) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn anti_calibration_yields_zero() {
        assert!((brier_accuracy(1.0, false) - 0.0).abs() < 1e-9);
        assert!((brier_accuracy(0.0, true) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn no_data_is_neutral() {
        assert!((AgentPerformanceMetrics::neutral("a").accuracy_score - 0.5).abs() < 1e-9);
    }
}
