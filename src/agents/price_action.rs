//! Price Action agent (§4.4): complements Market Microstructure with a
//! pure trend/momentum read over recent price history, independent of
//! order-book depth.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct PriceActionAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    trend: Option<String>,
}

impl Agent for PriceActionAgent {
    fn agent_name(&self) -> &'static str {
        "price_action"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a price action analyst. Characterize the recent trend (uptrend, \
         downtrend, range-bound) in the market's quoted probability and project it \
         forward to a fair-probability estimate. Respond with strict JSON: \
         {\"fair_probability\": number, \"confidence\": number, \"key_drivers\": [string], \
         \"risk_factors\": [string], \"trend\": string}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nCurrent probability: {prob:.3}\nVolatility regime: {vol:?}\n24h volume: {vol24:.0}",
            question = ctx.mbd.question,
            prob = ctx.mbd.current_probability,
            vol = ctx.mbd.volatility_regime,
            vol24 = ctx.mbd.volume_24h,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let metadata = serde_json::json!({ "trend": raw.trend });

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
