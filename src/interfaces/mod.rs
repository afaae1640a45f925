//! Contracts to the out-of-scope external collaborators (§6): the
//! prediction-market HTTP client, the LLM provider, the persistence
//! database, and the observability sink. Production code in the rest of
//! this crate depends only on these traits.

mod llm_provider;
mod market_client;
mod observability;
mod persistence;

pub use llm_provider::{LlmProvider, LlmUsage};
pub use market_client::{MarketClient, MarketSummary, RawMarket, ResolutionOutcome, ResolutionStatus};
pub use observability::{ObservabilitySink, TracingObservabilitySink};
pub use persistence::Persistence;
