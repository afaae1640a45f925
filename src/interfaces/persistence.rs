use crate::models::{AgentPerformanceMetrics, AgentSignal, MarketBriefingDocument, TradeRecommendation};
use async_trait::async_trait;

/// Consumed contract for the persistence layer (§6). Every operation must be
/// idempotent under retries — the `Sqlite` implementation expresses this as
/// `INSERT ... ON CONFLICT DO UPDATE`.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn upsert_market(&self, mbd: &MarketBriefingDocument) -> anyhow::Result<()>;
    async fn store_recommendation(&self, condition_id: &str, recommendation: &TradeRecommendation) -> anyhow::Result<()>;
    async fn store_agent_signals(&self, condition_id: &str, signals: &[AgentSignal]) -> anyhow::Result<()>;
    async fn record_analysis(&self, condition_id: &str, summary: &str) -> anyhow::Result<()>;
    async fn get_markets_for_update(&self, interval_ms: u64) -> anyhow::Result<Vec<String>>;
    async fn mark_market_resolved(&self, condition_id: &str) -> anyhow::Result<()>;
    async fn get_latest_recommendation(&self, condition_id: &str) -> anyhow::Result<Option<TradeRecommendation>>;
    async fn get_recent_signals(&self, agent_name: &str, market_id: &str, k: usize) -> anyhow::Result<Vec<AgentSignal>>;
    async fn get_performance(&self, agent_name: &str) -> anyhow::Result<Option<AgentPerformanceMetrics>>;
    async fn upsert_performance(&self, metrics: &AgentPerformanceMetrics) -> anyhow::Result<()>;
    async fn all_performance(&self) -> anyhow::Result<Vec<AgentPerformanceMetrics>>;
}
