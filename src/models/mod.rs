//! Data model (§3). Representation is plain serde-friendly structs/enums —
//! tagged variants over inheritance, per the redesign notes.

mod audit;
mod consensus;
mod debate;
mod mbd;
mod performance;
mod recommendation;
mod signal;
mod thesis;
#[cfg(test)]
pub mod test_support;

pub use audit::AuditLogEntry;
pub use consensus::{ConsensusProbability, ConsensusRegime};
pub use debate::{survival_score, DebateRecord, TestName, TestOutcome, Verdict};
pub use mbd::{EventType, KeyCatalyst, MarketBriefingDocument, MbdMetadata, VolatilityRegime};
pub use performance::{brier_accuracy, AgentPerformanceMetrics};
pub use recommendation::{Explanation, LiquidityRisk, TradeAction, TradeRecommendation};
pub use signal::{AgentSignal, Direction};
pub use thesis::Thesis;
