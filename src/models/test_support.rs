//! Shared fixtures for unit tests across modules (agents, graph nodes,
//! fusion) that all need a plausible [`MarketBriefingDocument`] without
//! repeating its dozen fields in every test file.

use chrono::{Duration, Utc};

use super::mbd::{EventType, MbdMetadata, VolatilityRegime};
use super::MarketBriefingDocument;

pub fn sample_mbd() -> MarketBriefingDocument {
    MarketBriefingDocument {
        market_id: "market-1".to_string(),
        condition_id: "cond-1".to_string(),
        event_type: EventType::Other,
        question: "Will the test pass?".to_string(),
        resolution_criteria: "Resolves YES if the suite is green.".to_string(),
        expiry_timestamp: Utc::now() + Duration::days(7),
        current_probability: 0.5,
        liquidity_score: 6.0,
        bid_ask_spread: 2.0,
        volatility_regime: VolatilityRegime::Low,
        volume_24h: 10_000.0,
        metadata: MbdMetadata::default(),
    }
}
