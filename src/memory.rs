//! Memory retrieval node (§4.3): for each agent, pulls its last
//! `k ∈ [3,5]` signals on this market, oldest-to-newest, and renders them
//! into a length-budgeted context string. A slow or failing persistence
//! layer degrades to an empty context rather than aborting the run — this
//! node is never one of the three abort-eligible failure classes (§5).

use std::time::Duration;

use crate::config::MemoryConfig;
use crate::interfaces::Persistence;
use crate::models::AgentSignal;

#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub text: String,
    pub truncated: bool,
}

impl MemoryContext {
    fn empty() -> Self {
        Self::default()
    }
}

/// Renders `signals` (assumed oldest-to-newest) into a bullet list, dropping
/// the oldest entries first if the result would exceed `max_chars` — the
/// newest signals are the ones worth preserving.
fn render(signals: &[AgentSignal], max_chars: usize) -> MemoryContext {
    if signals.is_empty() {
        return MemoryContext::empty();
    }

    let lines: Vec<String> = signals
        .iter()
        .map(|s| {
            format!(
                "- [{ts}] direction={dir:?} fair_probability={fp:.3} confidence={conf:.3} drivers={drivers}",
                ts = s.timestamp.to_rfc3339(),
                dir = s.direction,
                fp = s.fair_probability,
                conf = s.confidence,
                drivers = s.key_drivers.join("; "),
            )
        })
        .collect();

    let full = lines.join("\n");
    if full.len() <= max_chars {
        return MemoryContext {
            text: full,
            truncated: false,
        };
    }

    // Drop oldest lines until what remains fits, keeping the newest tail.
    let mut kept = lines.len();
    loop {
        if kept == 0 {
            return MemoryContext {
                text: String::new(),
                truncated: true,
            };
        }
        let candidate = lines[lines.len() - kept..].join("\n");
        if candidate.len() <= max_chars {
            return MemoryContext {
                text: candidate,
                truncated: true,
            };
        }
        kept -= 1;
    }
}

/// Fetches recent signals for `agent_name` on `market_id` under a timeout,
/// returning an empty context (never an error) on timeout or persistence
/// failure (§4.3 "graceful degradation").
pub async fn retrieve_memory_context(
    persistence: &dyn Persistence,
    agent_name: &str,
    market_id: &str,
    config: &MemoryConfig,
) -> MemoryContext {
    let fetch = persistence.get_recent_signals(agent_name, market_id, config.signals_per_agent);
    match tokio::time::timeout(Duration::from_millis(config.timeout_ms), fetch).await {
        Ok(Ok(signals)) => render(&signals, config.max_context_chars),
        Ok(Err(_)) | Err(_) => MemoryContext::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, TradeRecommendation};
    use crate::models::{AgentPerformanceMetrics, MarketBriefingDocument};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    struct FakePersistence {
        signals: Vec<AgentSignal>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Persistence for FakePersistence {
        async fn upsert_market(&self, _mbd: &MarketBriefingDocument) -> anyhow::Result<()> {
            Ok(())
        }
        async fn store_recommendation(&self, _condition_id: &str, _recommendation: &TradeRecommendation) -> anyhow::Result<()> {
            Ok(())
        }
        async fn store_agent_signals(&self, _condition_id: &str, _signals: &[AgentSignal]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_analysis(&self, _condition_id: &str, _summary: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_markets_for_update(&self, _interval_ms: u64) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn mark_market_resolved(&self, _condition_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_latest_recommendation(&self, _condition_id: &str) -> anyhow::Result<Option<TradeRecommendation>> {
            Ok(None)
        }
        async fn get_recent_signals(&self, _agent_name: &str, _market_id: &str, k: usize) -> anyhow::Result<Vec<AgentSignal>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("persistence unavailable");
            }
            let mut signals = self.signals.clone();
            signals.truncate(k);
            Ok(signals)
        }
        async fn get_performance(&self, _agent_name: &str) -> anyhow::Result<Option<AgentPerformanceMetrics>> {
            Ok(None)
        }
        async fn upsert_performance(&self, _metrics: &AgentPerformanceMetrics) -> anyhow::Result<()> {
            Ok(())
        }
        async fn all_performance(&self) -> anyhow::Result<Vec<AgentPerformanceMetrics>> {
            Ok(vec![])
        }
    }

    fn sample_signal(offset_hours: i64) -> AgentSignal {
        AgentSignal {
            agent_name: "probability_baseline".to_string(),
            timestamp: Utc::now() - ChronoDuration::hours(offset_hours),
            confidence: 0.6,
            direction: Direction::Yes,
            fair_probability: 0.6,
            key_drivers: vec!["driver".to_string()],
            risk_factors: vec![],
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn empty_history_returns_empty_context() {
        let persistence = FakePersistence {
            signals: vec![],
            delay: Duration::from_millis(0),
            fail: false,
        };
        let ctx = retrieve_memory_context(&persistence, "probability_baseline", "market-1", &MemoryConfig::default()).await;
        assert!(ctx.text.is_empty());
        assert!(!ctx.truncated);
    }

    #[tokio::test]
    async fn renders_oldest_to_newest() {
        let persistence = FakePersistence {
            signals: vec![sample_signal(2), sample_signal(1)],
            delay: Duration::from_millis(0),
            fail: false,
        };
        let ctx = retrieve_memory_context(&persistence, "probability_baseline", "market-1", &MemoryConfig::default()).await;
        assert_eq!(ctx.text.lines().count(), 2);
        assert!(!ctx.truncated);
    }

    #[tokio::test]
    async fn overflow_truncates_preserving_newest() {
        let signals: Vec<AgentSignal> = (0..5).map(|i| sample_signal(5 - i)).collect();
        let persistence = FakePersistence {
            signals,
            delay: Duration::from_millis(0),
            fail: false,
        };
        let mut config = MemoryConfig::default();
        config.max_context_chars = 50;
        let ctx = retrieve_memory_context(&persistence, "probability_baseline", "market-1", &config).await;
        assert!(ctx.truncated);
        assert!(ctx.text.len() <= 50);
    }

    #[tokio::test]
    async fn persistence_failure_degrades_to_empty() {
        let persistence = FakePersistence {
            signals: vec![sample_signal(1)],
            delay: Duration::from_millis(0),
            fail: true,
        };
        let ctx = retrieve_memory_context(&persistence, "probability_baseline", "market-1", &MemoryConfig::default()).await;
        assert!(ctx.text.is_empty());
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty() {
        let persistence = FakePersistence {
            signals: vec![sample_signal(1)],
            delay: Duration::from_millis(50),
            fail: false,
        };
        let mut config = MemoryConfig::default();
        config.timeout_ms = 5;
        let ctx = retrieve_memory_context(&persistence, "probability_baseline", "market-1", &config).await;
        assert!(ctx.text.is_empty());
    }
}
