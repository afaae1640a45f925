//! Intelligence agents (§4.4): schema-typed, LLM-backed analysts that each
//! produce one [`AgentSignal`]. Agents differ by `agent_name()` and output
//! shape, not by a class hierarchy (§9 "tagged variants instead of
//! inheritance") — the [`AgentRegistry`] is a name → boxed trait object map,
//! matching the teacher's `signals::detector` style of one struct per
//! detection strategy behind a shared call surface.

mod breaking_news;
mod event_impact;
mod market_microstructure;
mod narrative_velocity;
mod polling_statistical;
mod price_action;
mod probability_baseline;
mod risk_assessment;
mod risk_philosophy;
mod social_sentiment;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AgentError;
use crate::external::{NewsArticle, PollingSnapshot, SocialMention};
use crate::models::{AgentSignal, Direction, MarketBriefingDocument};

pub use breaking_news::BreakingNewsAgent;
pub use event_impact::EventImpactAgent;
pub use market_microstructure::MarketMicrostructureAgent;
pub use narrative_velocity::NarrativeVelocityAgent;
pub use polling_statistical::PollingStatisticalAgent;
pub use price_action::PriceActionAgent;
pub use probability_baseline::ProbabilityBaselineAgent;
pub use risk_assessment::RiskAssessmentAgent;
pub use risk_philosophy::RiskPhilosophyAgent;
pub use social_sentiment::SocialSentimentAgent;

/// Name used for the risk-philosophy agent; cross-examination's tail-risk
/// test (§4.8) looks specifically for this agent's opposing signals.
pub const RISK_PHILOSOPHY_AGENT_NAME: &str = "risk_philosophy";

/// Everything an agent needs to build its prompt and interpret the model's
/// answer: the MBD, formatted memory context (§4.3), and whatever external
/// data the cache layer returned (§4.6). Agents that don't use a given
/// source simply ignore it (e.g. Probability Baseline never reads `news`).
pub struct AgentContext<'a> {
    pub mbd: &'a MarketBriefingDocument,
    pub memory_context: &'a str,
    pub news: &'a [NewsArticle],
    pub polling: Option<&'a [PollingSnapshot]>,
    pub social: Option<&'a [SocialMention]>,
    pub now: DateTime<Utc>,
}

/// `{prepareInput(state) → promptBundle, invokeLLM(promptBundle, schema) →
/// typedOutput, postProcess(typedOutput, state) → AgentSignal}` (§4.4). The
/// harness owns `invokeLLM` (it is identical across agents modulo the
/// prompt strings); each agent supplies `system_prompt` /
/// `build_user_prompt` (prepareInput) and `parse_output` (postProcess).
pub trait Agent: Send + Sync {
    fn agent_name(&self) -> &'static str;
    fn system_prompt(&self) -> &'static str;
    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String;
    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError>;
}

/// Registry mapping `agent_name → boxed trait object` (§9). Built once at
/// startup and shared (read-only) across every graph run.
pub struct AgentRegistry {
    agents: HashMap<&'static str, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            agents: agents.into_iter().map(|a| (a.agent_name(), a)).collect(),
        }
    }

    /// The full N≈10 agent set (§4.4), in fan-out order.
    pub fn default_agents() -> Self {
        let agents: Vec<Arc<dyn Agent>> = vec![
            Arc::new(MarketMicrostructureAgent),
            Arc::new(ProbabilityBaselineAgent),
            Arc::new(RiskAssessmentAgent),
            Arc::new(BreakingNewsAgent),
            Arc::new(EventImpactAgent),
            Arc::new(SocialSentimentAgent),
            Arc::new(NarrativeVelocityAgent),
            Arc::new(PollingStatisticalAgent),
            Arc::new(PriceActionAgent),
            Arc::new(RiskPhilosophyAgent),
        ];
        Self::new(agents)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Agent>> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Shared constructor used by every agent's `parse_output`: validates and
/// repairs `fair_probability`/`confidence` (§6 schema validation), enforces
/// the 1..=5 key-driver bound, and derives `direction` unless the agent
/// explicitly justifies a NEUTRAL override (§3 Agent Signal invariant).
pub fn build_signal(
    agent_name: &str,
    now: DateTime<Utc>,
    fair_probability: f64,
    confidence: f64,
    explicit_direction: Option<Direction>,
    mut key_drivers: Vec<String>,
    risk_factors: Vec<String>,
    metadata: serde_json::Value,
) -> Result<AgentSignal, AgentError> {
    let fair_probability = crate::llm::validate_probability_field("fair_probability", fair_probability)
        .map_err(|e| AgentError::InvalidSignal {
            agent: agent_name.to_string(),
            reason: e.to_string(),
        })?;
    let confidence = crate::llm::validate_probability_field("confidence", confidence).map_err(|e| AgentError::InvalidSignal {
        agent: agent_name.to_string(),
        reason: e.to_string(),
    })?;

    if key_drivers.is_empty() {
        return Err(AgentError::InvalidSignal {
            agent: agent_name.to_string(),
            reason: "no key drivers produced".to_string(),
        });
    }
    key_drivers.truncate(5);

    let direction = explicit_direction.unwrap_or_else(|| Direction::from_probability(fair_probability));

    let signal = AgentSignal {
        agent_name: agent_name.to_string(),
        timestamp: now,
        confidence,
        direction,
        fair_probability,
        key_drivers,
        risk_factors,
        metadata,
    };

    if !signal.is_valid() {
        return Err(AgentError::InvalidSignal {
            agent: agent_name.to_string(),
            reason: format!(
                "direction {:?} inconsistent with fair_probability {:.3} at confidence {:.3}",
                signal.direction, signal.fair_probability, signal.confidence
            ),
        });
    }

    Ok(signal)
}
