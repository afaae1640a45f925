use crate::error::IngestionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw order-book/market payload as returned by the prediction-market API,
/// prior to the ingestion node's transform into an MBD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMarket {
    pub market_id: String,
    pub condition_id: String,
    pub question: String,
    pub resolution_criteria: String,
    pub expiry_timestamp: DateTime<Utc>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub bid_sizes: Vec<f64>,
    pub ask_sizes: Vec<f64>,
    pub volume_24h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionOutcome {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Unresolved,
    Resolved {
        outcome: ResolutionOutcome,
        resolved_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub condition_id: String,
    pub question: String,
}

/// Consumed contract for the prediction-market HTTP client (§6). The
/// production binary wires a concrete `reqwest`-based implementation; the
/// analysis core here only ever sees this trait object.
#[async_trait]
pub trait MarketClient: Send + Sync {
    async fn fetch_market_data(&self, condition_id: &str) -> Result<RawMarket, IngestionError>;
    async fn check_market_resolution(&self, condition_id: &str) -> Result<ResolutionStatus, IngestionError>;
    async fn discover_markets(&self, limit: usize) -> Result<Vec<MarketSummary>, IngestionError>;
    async fn health_check(&self) -> bool;
}
