use async_trait::async_trait;

/// Consumed contract for the observability sink (§6): append-only events for
/// each LLM call, data fetch, and cycle start/end. The default
/// implementation emits `tracing` events carrying `condition_id` as a field
/// so events inside one graph run are grouped, matching the contract's
/// grouping requirement without needing a bespoke trace id allocator.
#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn record_llm_call(&self, condition_id: &str, agent_name: &str, latency_ms: u64, total_tokens: Option<u64>);
    async fn record_fetch(
        &self,
        condition_id: &str,
        source: &str,
        provider: Option<&str>,
        cached: bool,
        stale: bool,
        item_count: usize,
        duration_ms: u64,
        error: Option<&str>,
    );
    async fn record_cycle_start(&self, cycle_id: &str);
    async fn record_cycle_end(&self, cycle_id: &str, markets_analyzed: usize, duration_ms: u64);
}

#[derive(Debug, Clone, Default)]
pub struct TracingObservabilitySink;

#[async_trait]
impl ObservabilitySink for TracingObservabilitySink {
    async fn record_llm_call(&self, condition_id: &str, agent_name: &str, latency_ms: u64, total_tokens: Option<u64>) {
        tracing::info!(
            condition_id,
            agent_name,
            latency_ms,
            total_tokens,
            "llm_call"
        );
    }

    async fn record_fetch(
        &self,
        condition_id: &str,
        source: &str,
        provider: Option<&str>,
        cached: bool,
        stale: bool,
        item_count: usize,
        duration_ms: u64,
        error: Option<&str>,
    ) {
        tracing::info!(condition_id, source, provider, cached, stale, item_count, duration_ms, error, "external_fetch");
    }

    async fn record_cycle_start(&self, cycle_id: &str) {
        tracing::info!(cycle_id, "cycle_start");
    }

    async fn record_cycle_end(&self, cycle_id: &str, markets_analyzed: usize, duration_ms: u64) {
        tracing::info!(cycle_id, markets_analyzed, duration_ms, "cycle_end");
    }
}
