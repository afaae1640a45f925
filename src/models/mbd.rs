use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Election,
    Policy,
    Court,
    Geopolitical,
    Economic,
    Other,
}

impl EventType {
    /// Classifies by keyword match over the market question (§4.2).
    pub fn classify(question: &str) -> Self {
        let q = question.to_ascii_lowercase();
        const ELECTION: &[&str] = &["election", "primary", "ballot", "candidate", "president"];
        const POLICY: &[&str] = &["bill", "policy", "legislation", "regulation", "tariff"];
        const COURT: &[&str] = &["court", "ruling", "verdict", "lawsuit", "scotus", "appeal"];
        const GEOPOLITICAL: &[&str] = &["war", "invasion", "treaty", "sanctions", "ceasefire"];
        const ECONOMIC: &[&str] = &["inflation", "gdp", "rate hike", "fed", "recession", "jobs"];

        let hits = |kws: &[&str]| kws.iter().any(|k| q.contains(k));
        if hits(ELECTION) {
            EventType::Election
        } else if hits(COURT) {
            EventType::Court
        } else if hits(GEOPOLITICAL) {
            EventType::Geopolitical
        } else if hits(ECONOMIC) {
            EventType::Economic
        } else if hits(POLICY) {
            EventType::Policy
        } else {
            EventType::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
}

impl VolatilityRegime {
    /// Spread thresholds per §4.2: <2c low, <5c medium, else high.
    pub fn from_spread_cents(spread_cents: f64) -> Self {
        if spread_cents < 2.0 {
            VolatilityRegime::Low
        } else if spread_cents < 5.0 {
            VolatilityRegime::Medium
        } else {
            VolatilityRegime::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyCatalyst {
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MbdMetadata {
    pub ambiguity_flags: Vec<String>,
    pub key_catalysts: Vec<KeyCatalyst>,
}

/// Immutable per-run snapshot of a market, produced by ingestion (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBriefingDocument {
    pub market_id: String,
    pub condition_id: String,
    pub event_type: EventType,
    pub question: String,
    pub resolution_criteria: String,
    pub expiry_timestamp: DateTime<Utc>,
    pub current_probability: f64,
    pub liquidity_score: f64,
    pub bid_ask_spread: f64,
    pub volatility_regime: VolatilityRegime,
    pub volume_24h: f64,
    pub metadata: MbdMetadata,
}

impl MarketBriefingDocument {
    /// `liquidityScore = min(10, log10(1 + Σsizes)·2)` (§4.2).
    pub fn compute_liquidity_score(total_book_size: f64) -> f64 {
        (1.0 + total_book_size.max(0.0)).log10() * 2.0
    }
    pub fn clamp_liquidity_score(raw: f64) -> f64 {
        raw.min(10.0).max(0.0)
    }

    /// `bidAskSpread = (bestAsk − bestBid)·100` (§4.2), expressed in cents.
    pub fn compute_spread_cents(best_bid: f64, best_ask: f64) -> f64 {
        (best_ask - best_bid) * 100.0
    }

    pub fn is_valid(&self, ingestion_time: DateTime<Utc>) -> bool {
        self.expiry_timestamp > ingestion_time
            && (0.0..=1.0).contains(&self.current_probability)
            && (0.0..=10.0).contains(&self.liquidity_score)
            && self.bid_ask_spread >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatility_regime_thresholds() {
        assert_eq!(VolatilityRegime::from_spread_cents(1.0), VolatilityRegime::Low);
        assert_eq!(VolatilityRegime::from_spread_cents(3.0), VolatilityRegime::Medium);
        assert_eq!(VolatilityRegime::from_spread_cents(9.0), VolatilityRegime::High);
    }

    #[test]
    fn spread_arithmetic_matches_spec() {
        // Property 2: bidAskSpread ≈ (bestAsk − bestBid)·100.
        let spread = MarketBriefingDocument::compute_spread_cents(0.48, 0.52);
        assert!((spread - 4.0).abs() < 1e-9);
    }

    #[test]
    fn event_type_classification() {
        assert_eq!(
            EventType::classify("Will the incumbent win the presidential election?"),
            EventType::Election
        );
        assert_eq!(
            EventType::classify("Will the Supreme Court rule in favor of the appellant?"),
            EventType::Court
        );
        assert_eq!(
            EventType::classify("Will the Fed cut interest rates in Q3?"),
            EventType::Economic
        );
        assert_eq!(EventType::classify("Will it rain in Paris tomorrow?"), EventType::Other);
    }
}
