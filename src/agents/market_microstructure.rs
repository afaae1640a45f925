//! Market Microstructure agent (§4.4): reads order-book/spread/momentum off
//! the MBD and produces a fair-probability estimate grounded in liquidity
//! conditions rather than narrative.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct MarketMicrostructureAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    momentum: Option<f64>,
    #[serde(default)]
    order_book_imbalance: Option<f64>,
}

impl Agent for MarketMicrostructureAgent {
    fn agent_name(&self) -> &'static str {
        "market_microstructure"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a market microstructure analyst for a binary prediction market. \
         Given the order book, spread, and liquidity conditions, estimate the fair \
         probability of YES resolving. Respond with strict JSON matching: \
         {\"fair_probability\": number, \"confidence\": number, \"key_drivers\": [string], \
         \"risk_factors\": [string], \"momentum\": number, \"order_book_imbalance\": number}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Question: {question}\nCurrent probability: {prob:.3}\nLiquidity score (0-10): {liq:.2}\n\
             Bid/ask spread (cents): {spread:.2}\nVolatility regime: {vol:?}\n24h volume: {vol24:.0}\n\
             Memory context:\n{memory}",
            question = ctx.mbd.question,
            prob = ctx.mbd.current_probability,
            liq = ctx.mbd.liquidity_score,
            spread = ctx.mbd.bid_ask_spread,
            vol = ctx.mbd.volatility_regime,
            vol24 = ctx.mbd.volume_24h,
            memory = ctx.memory_context,
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let metadata = serde_json::json!({
            "momentum": raw.momentum,
            "order_book_imbalance": raw.order_book_imbalance,
            "liquidity_score": ctx.mbd.liquidity_score,
            "bid_ask_spread": ctx.mbd.bid_ask_spread,
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
