//! Risk Assessment agent (§4.4): focuses on tail risk and failure modes
//! rather than the point estimate — its `risk_factors` feed directly into
//! the recommendation's failure-scenario explanation (§4.10).

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct RiskAssessmentAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    tail_risk_score: Option<f64>,
}

impl Agent for RiskAssessmentAgent {
    fn agent_name(&self) -> &'static str {
        "risk_assessment"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a risk assessment analyst for a binary prediction market. Identify \
         tail risks and failure modes that could invalidate the consensus view, then \
         give your own fair-probability estimate discounted for those risks. Respond \
         with strict JSON: {\"fair_probability\": number, \"confidence\": number, \
         \"key_drivers\": [string], \"risk_factors\": [string], \"tail_risk_score\": number}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nResolution criteria: {criteria}\nAmbiguity flags: {flags:?}\n\
             Volatility regime: {vol:?}\nMemory context:\n{memory}",
            question = ctx.mbd.question,
            criteria = ctx.mbd.resolution_criteria,
            flags = ctx.mbd.metadata.ambiguity_flags,
            vol = ctx.mbd.volatility_regime,
            memory = ctx.memory_context,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        if raw.risk_factors.is_empty() {
            return Err(AgentError::InvalidSignal {
                agent: self.agent_name().to_string(),
                reason: "risk assessment must cite at least one risk factor".to_string(),
            });
        }

        let metadata = serde_json::json!({ "tail_risk_score": raw.tail_risk_score });

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
