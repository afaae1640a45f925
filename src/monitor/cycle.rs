//! One monitor cycle (§4.11): discover new markets up to half the cycle
//! budget, then spend the remainder refreshing markets due for an update,
//! skipping any that have since resolved.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::graph::{run_graph, GraphDeps};

use super::quota::QuotaManager;

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub discovered: usize,
    pub refreshed: usize,
    pub resolved_skipped: usize,
    pub errors: usize,
}

pub async fn run_cycle(deps: &Arc<GraphDeps>, quota: &QuotaManager) -> anyhow::Result<CycleReport> {
    let cycle_id = Uuid::new_v4().to_string();
    let cycle_start = Instant::now();
    deps.observability.record_cycle_start(&cycle_id).await;
    let report = run_cycle_inner(deps, quota).await?;
    deps.observability
        .record_cycle_end(&cycle_id, report.discovered + report.refreshed, cycle_start.elapsed().as_millis() as u64)
        .await;
    Ok(report)
}

async fn run_cycle_inner(deps: &Arc<GraphDeps>, quota: &QuotaManager) -> anyhow::Result<CycleReport> {
    let mut report = CycleReport::default();
    let max_markets = quota.recommend_max_markets(deps.config.monitor.max_markets_per_cycle);
    if max_markets == 0 {
        tracing::warn!("daily quota exhausted; skipping cycle");
        return Ok(report);
    }

    let new_budget = max_markets / 2;
    let discovered = deps.market_client.discover_markets(new_budget).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "market discovery failed; continuing with zero new markets");
        Vec::new()
    });

    for market in &discovered {
        analyze_one(deps, &market.condition_id, &mut report).await;
        quota.record_usage(1);
    }
    report.discovered = discovered.len();

    let refresh_budget = max_markets.saturating_sub(discovered.len());
    if refresh_budget == 0 {
        return Ok(report);
    }

    let candidates = deps.persistence.get_markets_for_update(deps.config.monitor.update_interval_ms).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "fetching markets due for update failed");
        Vec::new()
    });

    for condition_id in candidates.into_iter().take(refresh_budget) {
        match deps.market_client.check_market_resolution(&condition_id).await {
            Ok(crate::interfaces::ResolutionStatus::Resolved { outcome, .. }) => {
                if let Err(err) = deps.persistence.mark_market_resolved(&condition_id).await {
                    tracing::warn!(condition_id, error = %err, "failed to mark market resolved");
                }
                evaluate_resolution(deps, &condition_id, outcome).await;
                report.resolved_skipped += 1;
                continue;
            }
            Ok(crate::interfaces::ResolutionStatus::Unresolved) => {}
            Err(err) => {
                tracing::warn!(condition_id, error = %err, "resolution check failed; refreshing anyway");
            }
        }
        analyze_one(deps, &condition_id, &mut report).await;
        quota.record_usage(1);
        report.refreshed += 1;
    }

    Ok(report)
}

/// On market resolution, score each agent's most recent signal for this
/// market against the realized outcome and fold it into `accuracyScore` via
/// the performance tracker's Brier-EMA (§4.12), then persist the updated
/// metrics. `Unknown` outcomes carry no calibration signal and are skipped.
async fn evaluate_resolution(deps: &Arc<GraphDeps>, condition_id: &str, outcome: crate::interfaces::ResolutionOutcome) {
    if !deps.config.performance_tracking.evaluate_on_resolution {
        return;
    }
    let actual_outcome_is_yes = match outcome {
        crate::interfaces::ResolutionOutcome::Yes => true,
        crate::interfaces::ResolutionOutcome::No => false,
        crate::interfaces::ResolutionOutcome::Unknown => return,
    };

    for agent in deps.registry.iter() {
        let agent_name = agent.agent_name();
        let signals = match deps.persistence.get_recent_signals(agent_name, condition_id, 1).await {
            Ok(signals) => signals,
            Err(err) => {
                tracing::warn!(condition_id, agent_name, error = %err, "failed to load signal for resolution scoring");
                continue;
            }
        };
        let Some(signal) = signals.last() else { continue };

        deps.performance.record_resolution(agent_name, signal.fair_probability, actual_outcome_is_yes);
        if let Err(err) = deps.persistence.upsert_performance(&deps.performance.get(agent_name)).await {
            tracing::warn!(condition_id, agent_name, error = %err, "failed to persist updated performance metrics");
        }
    }
}

async fn analyze_one(deps: &Arc<GraphDeps>, condition_id: &str, report: &mut CycleReport) {
    match run_graph(deps, condition_id, Utc::now()).await {
        Ok(_) => {}
        Err(err) => {
            tracing::error!(condition_id, error = %err, "graph run failed during monitor cycle");
            report.errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRegistry;
    use crate::clock::{FakeClock, SharedClock};
    use crate::config::Config;
    use crate::error::IngestionError;
    use crate::external::{ExternalDataLayer, ExternalDataLayerConfig};
    use crate::harness::AgentHarness;
    use crate::interfaces::{LlmProvider, LlmUsage, MarketClient, MarketSummary, Persistence, RawMarket, ResolutionStatus, TracingObservabilitySink};
    use crate::models::{AgentPerformanceMetrics, AgentSignal, MarketBriefingDocument, TradeRecommendation};
    use crate::performance::PerformanceTracker;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixtureMarketClient {
        summaries: Vec<MarketSummary>,
    }

    #[async_trait]
    impl MarketClient for FixtureMarketClient {
        async fn fetch_market_data(&self, condition_id: &str) -> Result<RawMarket, IngestionError> {
            Ok(RawMarket {
                market_id: format!("market-{condition_id}"),
                condition_id: condition_id.to_string(),
                question: "Will the feature ship?".to_string(),
                resolution_criteria: "Resolves YES on ship.".to_string(),
                expiry_timestamp: Utc::now() + chrono::Duration::days(5),
                best_bid: Some(0.4),
                best_ask: Some(0.42),
                bid_sizes: vec![10.0],
                ask_sizes: vec![10.0],
                volume_24h: 1_000.0,
            })
        }
        async fn check_market_resolution(&self, _condition_id: &str) -> Result<ResolutionStatus, IngestionError> {
            Ok(ResolutionStatus::Unresolved)
        }
        async fn discover_markets(&self, limit: usize) -> Result<Vec<MarketSummary>, IngestionError> {
            Ok(self.summaries.iter().take(limit).cloned().collect())
        }
        async fn health_check(&self) -> bool {
            true
        }
    }

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _system_prompt: &str, _user_prompt: &str, _timeout: Duration) -> anyhow::Result<(String, LlmUsage)> {
            Ok((
                r#"{"fair_probability":0.55,"confidence":0.6,"key_drivers":["driver"],"risk_factors":[]}"#.to_string(),
                LlmUsage::default(),
            ))
        }
    }

    struct NullPersistence;

    #[async_trait]
    impl Persistence for NullPersistence {
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
            Ok(vec!["existing-1".to_string(), "existing-2".to_string()])
        }
        async fn mark_market_resolved(&self, _condition_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_latest_recommendation(&self, _condition_id: &str) -> anyhow::Result<Option<TradeRecommendation>> {
            Ok(None)
        }
        async fn get_recent_signals(&self, _agent_name: &str, _market_id: &str, _k: usize) -> anyhow::Result<Vec<AgentSignal>> {
            Ok(vec![])
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

    fn test_deps(discoverable: usize, daily_quota: u32) -> (Arc<GraphDeps>, QuotaManager) {
        let clock: SharedClock = Arc::new(FakeClock::new(Utc::now()));
        let mut config = Config::default();
        config.monitor.max_markets_per_cycle = 10;
        config.rate_limit.daily_quota = daily_quota;

        let external = ExternalDataLayer::new(
            ExternalDataLayerConfig {
                cache: config.cache.clone(),
                news: &config.external_data.news,
                polling: &config.external_data.polling,
                social: &config.external_data.social,
                breaker: &config.circuit_breaker,
                rate_limit: &config.rate_limit,
                retry: &config.retry,
            },
            clock.clone(),
            None,
            None,
            None,
            Arc::new(TracingObservabilitySink),
        );
        let performance = Arc::new(PerformanceTracker::new(Arc::new(crate::clock::SystemClock), &config.performance_tracking));

        let summaries: Vec<MarketSummary> = (0..discoverable)
            .map(|i| MarketSummary {
                market_id: format!("m{i}"),
                condition_id: format!("new-{i}"),
                question: "Will it happen?".to_string(),
            })
            .collect();

        let deps = Arc::new(GraphDeps {
            market_client: Arc::new(FixtureMarketClient { summaries }),
            persistence: Arc::new(NullPersistence),
            external: Arc::new(external),
            registry: Arc::new(AgentRegistry::default_agents()),
            harness: Arc::new(AgentHarness::new(Arc::new(StubLlm), performance.clone())),
            performance,
            config: Arc::new(config),
            observability: Arc::new(TracingObservabilitySink),
        });
        let quota = QuotaManager::new(daily_quota, clock);
        (deps, quota)
    }

    #[tokio::test]
    async fn discovery_takes_at_most_half_the_cycle_budget() {
        let (deps, quota) = test_deps(10, 100);
        let report = run_cycle(&deps, &quota).await.unwrap();
        assert_eq!(report.discovered, 5); // max_markets_per_cycle=10 -> new_budget=5
    }

    #[tokio::test]
    async fn remaining_budget_refreshes_existing_markets() {
        let (deps, quota) = test_deps(2, 100);
        let report = run_cycle(&deps, &quota).await.unwrap();
        assert_eq!(report.discovered, 2);
        assert_eq!(report.refreshed, 2); // both fixtures in get_markets_for_update
    }

    #[tokio::test]
    async fn exhausted_quota_yields_empty_cycle() {
        let (deps, quota) = test_deps(5, 10);
        quota.record_usage(10);
        let report = run_cycle(&deps, &quota).await.unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(report.refreshed, 0);
    }

    struct RecordingObservability {
        events: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl crate::interfaces::ObservabilitySink for RecordingObservability {
        async fn record_llm_call(&self, _condition_id: &str, _agent_name: &str, _duration_ms: u64, _tokens: Option<u64>) {}
        async fn record_fetch(
            &self,
            _condition_id: &str,
            _source: &str,
            _provider: Option<&str>,
            _cached: bool,
            _stale: bool,
            _item_count: usize,
            _duration_ms: u64,
            _error: Option<&str>,
        ) {
        }
        async fn record_cycle_start(&self, cycle_id: &str) {
            self.events.lock().push(format!("start:{cycle_id}"));
        }
        async fn record_cycle_end(&self, cycle_id: &str, markets_analyzed: usize, _duration_ms: u64) {
            self.events.lock().push(format!("end:{cycle_id}:{markets_analyzed}"));
        }
    }

    #[tokio::test]
    async fn run_cycle_reports_start_and_end_through_observability() {
        let (mut deps, quota) = test_deps(2, 100);
        let sink = Arc::new(RecordingObservability { events: parking_lot::Mutex::new(Vec::new()) });
        Arc::get_mut(&mut deps).unwrap().observability = sink.clone();

        let report = run_cycle(&deps, &quota).await.unwrap();

        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        let start_id = events[0].strip_prefix("start:").expect("first event is cycle start");
        let end = events[1].strip_prefix("end:").expect("second event is cycle end");
        let (end_id, markets_analyzed) = end.split_once(':').unwrap();
        assert_eq!(start_id, end_id, "start and end share the same cycle id");
        assert!(!start_id.is_empty());
        assert_eq!(markets_analyzed.parse::<usize>().unwrap(), report.discovered + report.refreshed);
    }

    struct ResolvedMarketClient;

    #[async_trait]
    impl MarketClient for ResolvedMarketClient {
        async fn fetch_market_data(&self, condition_id: &str) -> Result<RawMarket, IngestionError> {
            Ok(RawMarket {
                market_id: format!("market-{condition_id}"),
                condition_id: condition_id.to_string(),
                question: "Will the feature ship?".to_string(),
                resolution_criteria: "Resolves YES on ship.".to_string(),
                expiry_timestamp: Utc::now() + chrono::Duration::days(5),
                best_bid: Some(0.4),
                best_ask: Some(0.42),
                bid_sizes: vec![10.0],
                ask_sizes: vec![10.0],
                volume_24h: 1_000.0,
            })
        }
        async fn check_market_resolution(&self, _condition_id: &str) -> Result<ResolutionStatus, IngestionError> {
            Ok(ResolutionStatus::Resolved {
                outcome: crate::interfaces::ResolutionOutcome::Yes,
                resolved_at: Utc::now(),
            })
        }
        async fn discover_markets(&self, _limit: usize) -> Result<Vec<MarketSummary>, IngestionError> {
            Ok(vec![])
        }
        async fn health_check(&self) -> bool {
            true
        }
    }

    struct ResolutionPersistence {
        upserted: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Persistence for ResolutionPersistence {
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
            Ok(vec!["resolving-1".to_string()])
        }
        async fn mark_market_resolved(&self, _condition_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_latest_recommendation(&self, _condition_id: &str) -> anyhow::Result<Option<TradeRecommendation>> {
            Ok(None)
        }
        async fn get_recent_signals(&self, agent_name: &str, _market_id: &str, _k: usize) -> anyhow::Result<Vec<AgentSignal>> {
            Ok(vec![AgentSignal {
                agent_name: agent_name.to_string(),
                timestamp: Utc::now(),
                confidence: 0.8,
                direction: crate::models::Direction::Yes,
                fair_probability: 0.9,
                key_drivers: vec!["driver".to_string()],
                risk_factors: vec![],
                metadata: serde_json::Value::Null,
            }])
        }
        async fn get_performance(&self, _agent_name: &str) -> anyhow::Result<Option<AgentPerformanceMetrics>> {
            Ok(None)
        }
        async fn upsert_performance(&self, metrics: &AgentPerformanceMetrics) -> anyhow::Result<()> {
            self.upserted.lock().push(metrics.agent_name.clone());
            Ok(())
        }
        async fn all_performance(&self) -> anyhow::Result<Vec<AgentPerformanceMetrics>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn resolved_market_updates_agent_accuracy_via_brier_ema() {
        let clock: SharedClock = Arc::new(FakeClock::new(Utc::now()));
        let mut config = Config::default();
        config.monitor.max_markets_per_cycle = 10;
        config.performance_tracking.evaluate_on_resolution = true;

        let external = ExternalDataLayer::new(
            ExternalDataLayerConfig {
                cache: config.cache.clone(),
                news: &config.external_data.news,
                polling: &config.external_data.polling,
                social: &config.external_data.social,
                breaker: &config.circuit_breaker,
                rate_limit: &config.rate_limit,
                retry: &config.retry,
            },
            clock.clone(),
            None,
            None,
            None,
            Arc::new(TracingObservabilitySink),
        );
        let performance = Arc::new(PerformanceTracker::new(Arc::new(crate::clock::SystemClock), &config.performance_tracking));
        let persistence = Arc::new(ResolutionPersistence { upserted: parking_lot::Mutex::new(Vec::new()) });
        let registry = Arc::new(AgentRegistry::default_agents());
        let agent_count = registry.len();

        let deps = Arc::new(GraphDeps {
            market_client: Arc::new(ResolvedMarketClient),
            persistence: persistence.clone(),
            external: Arc::new(external),
            registry,
            harness: Arc::new(AgentHarness::new(Arc::new(StubLlm), performance.clone())),
            performance: performance.clone(),
            config: Arc::new(config),
            observability: Arc::new(TracingObservabilitySink),
        });
        let quota = QuotaManager::new(100, clock);

        let report = run_cycle(&deps, &quota).await.unwrap();

        assert_eq!(report.resolved_skipped, 1);
        assert_eq!(persistence.upserted.lock().len(), agent_count);

        // brier_accuracy(0.9, true) = 1 - (0.9 - 1.0)^2 = 0.99;
        // EMA from neutral 0.5: 0.1*0.99 + 0.9*0.5 = 0.549.
        let some_agent = deps.registry.iter().next().unwrap().agent_name();
        let updated = performance.get(some_agent);
        assert!((updated.accuracy_score - 0.549).abs() < 1e-9);
    }
}
