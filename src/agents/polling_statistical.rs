//! Polling/Statistical agent (§4.4): aggregates polling snapshots
//! (margin-of-error weighted) into a fair-probability estimate; falls back
//! to the market prior when no polling data is configured.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct PollingStatisticalAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    weighted_poll_average: Option<f64>,
}

impl Agent for PollingStatisticalAgent {
    fn agent_name(&self) -> &'static str {
        "polling_statistical"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a polling and statistical analyst. Weight each poll by sample size and \
         recency, discount wide margins of error, and produce a fair YES probability. If \
         no polling data is supplied, fall back to the market's quoted probability with \
         low confidence. Respond with strict JSON: {\"fair_probability\": number, \
         \"confidence\": number, \"key_drivers\": [string], \"risk_factors\": [string], \
         \"weighted_poll_average\": number}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        let polls = ctx
            .polling
            .map(|p| {
                p.iter()
                    .map(|s| format!("- {} n={} yes_share={:.3} moe={:.3} ({})", s.pollster, s.sample_size, s.yes_share, s.margin_of_error, s.collected_at))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| "(no polling data available)".to_string());

        format!(
            "Question: {question}\nMarket probability: {prob:.3}\nPolls:\n{polls}",
            question = ctx.mbd.question,
            prob = ctx.mbd.current_probability,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let metadata = serde_json::json!({
            "weighted_poll_average": raw.weighted_poll_average,
            "poll_count": ctx.polling.map(|p| p.len()).unwrap_or(0),
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
