//! Breaking News agent (§4.4): filters articles by `relevanceScore ≥ 0.5`
//! and only ever reports `regimeChange=true` when at least one
//! high-relevance article survives the filter — that half of the rule is
//! enforced here deterministically rather than trusted from the model.

use serde::Deserialize;

use super::{build_signal, Agent, AgentContext};
use crate::error::AgentError;
use crate::external::NewsArticle;
use crate::models::AgentSignal;

const RELEVANCE_THRESHOLD: f64 = 0.5;

pub struct BreakingNewsAgent;

#[derive(Debug, Deserialize)]
struct RawOutput {
    fair_probability: f64,
    confidence: f64,
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    regime_change: bool,
}

fn high_relevance_articles<'a>(articles: &'a [NewsArticle]) -> Vec<&'a NewsArticle> {
    articles.iter().filter(|a| a.relevance_score >= RELEVANCE_THRESHOLD).collect()
}

impl Agent for BreakingNewsAgent {
    fn agent_name(&self) -> &'static str {
        "breaking_news"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a breaking news analyst for a binary prediction market. Only the \
         articles provided below with relevance >= 0.5 should move your estimate; \
         lower-relevance articles are context only. Set regime_change=true only if a \
         high-relevance article represents a genuine shift, not routine coverage. \
         Respond with strict JSON: {\"fair_probability\": number, \"confidence\": number, \
         \"key_drivers\": [string], \"risk_factors\": [string], \"regime_change\": bool}."
    }

    fn build_user_prompt(&self, ctx: &AgentContext<'_>) -> String {
        let relevant = high_relevance_articles(ctx.news);
        let articles = relevant
            .iter()
            .map(|a| format!("- [{:.2}] {} ({}): {}", a.relevance_score, a.title, a.source, a.summary))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Question: {question}\nCurrent probability: {prob:.3}\nHigh-relevance articles ({count}):\n{articles}",
            question = ctx.mbd.question,
            prob = ctx.mbd.current_probability,
            count = relevant.len(),
            articles = if articles.is_empty() { "(none)".to_string() } else { articles },
        )
    }

    fn parse_output(&self, raw_output: &str, ctx: &AgentContext<'_>) -> Result<AgentSignal, AgentError> {
        let raw: RawOutput = serde_json::from_str(raw_output).map_err(|e| AgentError::InvalidSignal {
            agent: self.agent_name().to_string(),
            reason: format!("json parse: {e}"),
        })?;

        let has_high_relevance = !high_relevance_articles(ctx.news).is_empty();
        let regime_change = raw.regime_change && has_high_relevance;

        let metadata = serde_json::json!({
            "regime_change": regime_change,
            "high_relevance_count": high_relevance_articles(ctx.news).len(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(relevance: f64) -> NewsArticle {
        NewsArticle {
            title: "headline".into(),
            source: "wire".into(),
            published_at: Utc::now(),
            url: "https://example.com".into(),
            relevance_score: relevance,
            summary: "summary".into(),
        }
    }

    #[test]
    fn regime_change_forced_false_without_high_relevance_article() {
        let raw = r#"{"fair_probability":0.6,"confidence":0.7,"key_drivers":["d"],"risk_factors":[],"regime_change":true}"#;
        let articles = vec![article(0.2), article(0.4)];
        let mbd = crate::models::test_support::sample_mbd();
        let ctx = AgentContext {
            mbd: &mbd,
            memory_context: "",
            news: &articles,
            polling: None,
            social: None,
            now: Utc::now(),
        };
        let signal = BreakingNewsAgent.parse_output(raw, &ctx).unwrap();
        assert_eq!(signal.metadata["regime_change"], false);
    }

    #[test]
    fn regime_change_allowed_with_high_relevance_article() {
        let raw = r#"{"fair_probability":0.6,"confidence":0.7,"key_drivers":["d"],"risk_factors":[],"regime_change":true}"#;
        let articles = vec![article(0.9)];
        let mbd = crate::models::test_support::sample_mbd();
        let ctx = AgentContext {
            mbd: &mbd,
            memory_context: "",
            news: &articles,
            polling: None,
            social: None,
            now: Utc::now(),
        };
        let signal = BreakingNewsAgent.parse_output(raw, &ctx).unwrap();
        assert_eq!(signal.metadata["regime_change"], true);
    }
}
