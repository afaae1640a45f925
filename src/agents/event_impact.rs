//! Event Impact agent (§4.4): reasons from historical analogs and assembles
//! a scenario tree whose probabilities must sum to 1±ε (the epsilon
//! absorbs floating-point/LLM rounding, not actual disagreement).

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

const SCENARIO_SUM_EPSILON: f64 = 0.03;

pub struct EventImpactAgent;

#[derive(Debug, Clone, Deserialize)]
struct Scenario {
    label: String,
    probability: f64,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    historical_analogs: Vec<String>,
    scenarios: Vec<Scenario>,
}

impl Agent for EventImpactAgent {
    fn agent_name(&self) -> &'static str {
        "event_impact"
    }

    fn system_prompt(&self) -> &'static str {
        "You are an event-impact analyst. Identify historical analogs for this market's \
         event type, then build a scenario tree whose probabilities sum to 1.0. Respond \
         with strict JSON: {\"fair_probability\": number, \"confidence\": number, \
         \"key_drivers\": [string], \"risk_factors\": [string], \"historical_analogs\": [string], \
         \"scenarios\": [{\"label\": string, \"probability\": number}]}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nEvent type: {event_type:?}\nKey catalysts: {catalysts:?}\n\
             Memory context:\n{memory}",
            question = ctx.mbd.question,
            event_type = ctx.mbd.event_type,
            catalysts = ctx.mbd.metadata.key_catalysts.iter().map(|c| &c.event).collect::<Vec<_>>(),
            memory = ctx.memory_context,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        if raw.scenarios.is_empty() {
            return Err(AgentError::InvalidSignal {
                agent: self.agent_name().to_string(),
                reason: "scenario tree must have at least one branch".to_string(),
            });
        }

        let sum: f64 = raw.scenarios.iter().map(|s| s.probability).sum();
        if (sum - 1.0).abs() > SCENARIO_SUM_EPSILON {
            return Err(AgentError::InvalidSignal {
                agent: self.agent_name().to_string(),
                reason: format!("scenario probabilities sum to {sum:.3}, expected 1.0±{SCENARIO_SUM_EPSILON}"),
            });
        }

        let scenarios_json: Vec<serde_json::Value> = raw
            .scenarios
            .iter()
            .map(|s| serde_json::json!({ "label": s.label, "probability": s.probability }))
            .collect();

        let metadata = serde_json::json!({
            "historical_analogs": raw.historical_analogs,
            "scenarios": scenarios_json,
        });

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
