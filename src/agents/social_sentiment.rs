//! Social Sentiment agent (§4.4): must emit `platformSentiment.overall`; if
//! the model omits it, it is computed here as the mean of the per-platform
//! scores rather than rejecting the signal outright.

use std::collections::HashMap;

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::models::AgentSignal;

pub struct SocialSentimentAgent;

#[derive(Debug, Deserialize)]
struct PlatformSentiment {
    #[serde(default)]
    overall: Option<f64>,
    #[serde(flatten)]
    platforms: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    platform_sentiment: PlatformSentiment,
}

impl Agent for SocialSentimentAgent {
    fn agent_name(&self) -> &'static str {
        "social_sentiment"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a social sentiment analyst. Summarize sentiment per platform and an \
         overall score in [-1,1], then translate that into a fair YES probability. \
         Respond with strict JSON: {\"fair_probability\": number, \"confidence\": number, \
         \"key_drivers\": [string], \"risk_factors\": [string], \
         \"platform_sentiment\": {\"overall\": number, \"<platform>\": number, ...}}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        let mentions = ctx
            .social
            .map(|m| {
                m.iter()
                    .map(|s| format!("- [{}] sentiment {:.2}, engagement {}: {}", s.platform, s.sentiment_score, s.engagement, s.excerpt))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| "(no social data available)".to_string());

        format!("Question: {question}\nRecent mentions:\n{mentions}", question = ctx.mbd.question)
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let overall = raw.platform_sentiment.overall.unwrap_or_else(|| {
            let values: Vec<f64> = raw.platform_sentiment.platforms.values().copied().collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        });

        let metadata = serde_json::json!({
            "platform_sentiment": {
                "overall": overall,
                "platforms": raw.platform_sentiment.platforms,
            }
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
