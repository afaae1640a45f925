//! Risk Philosophy agent (§4.4): a deliberately conservative, skeptical
//! voice that stress-tests the emerging consensus rather than forecasting
//! independently. Cross-examination's tail-risk test (§4.8) specifically
//! looks for this agent opposing a thesis at high confidence.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct RiskPhilosophyAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    skepticism_basis: Option<String>,
}

impl Agent for RiskPhilosophyAgent {
    fn agent_name(&self) -> &'static str {
        super::RISK_PHILOSOPHY_AGENT_NAME
    }

    fn system_prompt(&self) -> &'static str {
        "You are a risk philosophy analyst whose job is to stress-test consensus \
         thinking, not to forecast independently. Ask: what would have to be true for \
         the prevailing view to be wrong? Weight base rates and regression to the mean \
         over narrative momentum. Respond with strict JSON: {\"fair_probability\": number, \
         \"confidence\": number, \"key_drivers\": [string], \"risk_factors\": [string], \
         \"skepticism_basis\": string}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nCurrent market probability: {prob:.3}\nEvent type: {event_type:?}\n\
             Ambiguity flags: {flags:?}\nMemory context:\n{memory}",
            question = ctx.mbd.question,
            prob = ctx.mbd.current_probability,
            event_type = ctx.mbd.event_type,
            flags = ctx.mbd.metadata.ambiguity_flags,
            memory = ctx.memory_context,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let metadata = serde_json::json!({ "skepticism_basis": raw.skepticism_basis });

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
