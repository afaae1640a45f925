//! Probability Baseline agent (§4.4): a prior-only naive estimate. Unlike
//! every other agent it deliberately ignores memory context and external
//! data — it exists to anchor fusion against the market's own quoted
//! probability and the `eventType` base rate, so fusion can detect when
//! every *other* agent is drifting from a sane prior.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct ProbabilityBaselineAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
}

impl Agent for ProbabilityBaselineAgent {
    fn agent_name(&self) -> &'static str {
        "probability_baseline"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a statistical baseline estimator. Ignore narrative and news; estimate \
         the fair YES probability using only the market's quoted probability, its \
         event type's historical base rate, and time to expiry. Respond with strict \
         JSON: {\"fair_probability\": number, \"confidence\": number, \"key_drivers\": [string], \
         \"risk_factors\": [string]}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nEvent type: {event_type:?}\nQuoted market probability: {prob:.3}\n\
             Expiry: {expiry}\nAmbiguity flags: {flags:?}",
            question = ctx.mbd.question,
            event_type = ctx.mbd.event_type,
            prob = ctx.mbd.current_probability,
            expiry = ctx.mbd.expiry_timestamp,
            flags = ctx.mbd.metadata.ambiguity_flags,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let metadata = serde_json::json!({ "market_probability": ctx.mbd.current_probability });

        build_signal(
            self.agent_name(),
            ctx.now,
            raw.fair_probability,
            raw.confidence,
            None,
            raw.key_drivers,
            raw.risk_factors,
            metadata,
        )
    }
}
