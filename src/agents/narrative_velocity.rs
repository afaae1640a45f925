//! Narrative Velocity agent (§4.4): tracks emerging narratives and their
//! velocity/acceleration (how fast a storyline is gaining traction) rather
//! than static sentiment.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct NarrativeVelocityAgent;

#[derive(Debug, Clone, Deserialize)]
struct Narrative {
    label: String,
    velocity: f64,
    #[serde(default)]
    acceleration: f64,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    emerging_narratives: Vec<Narrative>,
}

impl Agent for NarrativeVelocityAgent {
    fn agent_name(&self) -> &'static str {
        "narrative_velocity"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a narrative velocity analyst. Identify emerging narratives around this \
         market and rate their velocity (rate of adoption) and acceleration (change in \
         velocity). Respond with strict JSON: {\"fair_probability\": number, \"confidence\": number, \
         \"key_drivers\": [string], \"risk_factors\": [string], \
         \"emerging_narratives\": [{\"label\": string, \"velocity\": number, \"acceleration\": number}]}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        let news = ctx
            .news
            .iter()
            .map(|a| format!("- {} ({})", a.title, a.published_at))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Question: {question}\nRecent coverage:\n{news}\nMemory context:\n{memory}",
            question = ctx.mbd.question,
            news = if news.is_empty() { "(none)".to_string() } else { news },
            memory = ctx.memory_context,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let narratives_json: Vec<serde_json::Value> = raw
            .emerging_narratives
            .iter()
            .map(|n| serde_json::json!({ "label": n.label, "velocity": n.velocity, "acceleration": n.acceleration }))
            .collect();

        let metadata = serde_json::json!({ "emerging_narratives": narratives_json });

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
