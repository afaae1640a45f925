//! Node implementations for the workflow graph (§4.2–§4.10). Each node is a
//! plain async function `(deps, state) -> PartialUpdate`; the runner
//! (`src/graph/runner.rs`) sequences them and merges the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::future::join_all;

use crate::agents::{AgentContext, AgentRegistry};
use crate::config::Config;
use crate::error::IngestionError;
use crate::external::ExternalDataLayer;
use crate::harness::{report_llm_call, AgentHarness};
use crate::interfaces::{MarketClient, ObservabilitySink, Persistence, RawMarket};
use crate::memory::{retrieve_memory_context, MemoryContext};
use crate::models::{AuditLogEntry, EventType, MarketBriefingDocument, MbdMetadata, VolatilityRegime};
use crate::performance::PerformanceTracker;

use super::state::{GraphState, PartialUpdate};
use crate::analysis;

/// Everything a node needs beyond the current `GraphState`. Constructed
/// once per process and shared (by reference) across every run.
pub struct GraphDeps {
    pub market_client: Arc<dyn MarketClient>,
    pub persistence: Arc<dyn Persistence>,
    pub external: Arc<ExternalDataLayer>,
    pub registry: Arc<AgentRegistry>,
    pub harness: Arc<AgentHarness>,
    pub performance: Arc<PerformanceTracker>,
    pub config: Arc<Config>,
    pub observability: Arc<dyn ObservabilitySink>,
}

fn build_mbd(raw: RawMarket) -> MarketBriefingDocument {
    let event_type = EventType::classify(&raw.question);

    let current_probability = match (raw.best_bid, raw.best_ask) {
        (Some(bid), Some(ask)) => (bid + ask) / 2.0,
        (Some(bid), None) => bid,
        (None, Some(ask)) => ask,
        (None, None) => 0.5,
    };

    let bid_ask_spread = match (raw.best_bid, raw.best_ask) {
        (Some(bid), Some(ask)) => MarketBriefingDocument::compute_spread_cents(bid, ask).max(0.0),
        _ => 0.0,
    };
    let volatility_regime = VolatilityRegime::from_spread_cents(bid_ask_spread);

    let total_book_size: f64 = raw.bid_sizes.iter().sum::<f64>() + raw.ask_sizes.iter().sum::<f64>();
    let liquidity_score = MarketBriefingDocument::clamp_liquidity_score(MarketBriefingDocument::compute_liquidity_score(total_book_size));

    MarketBriefingDocument {
        market_id: raw.market_id,
        condition_id: raw.condition_id,
        event_type,
        question: raw.question,
        resolution_criteria: raw.resolution_criteria,
        expiry_timestamp: raw.expiry_timestamp,
        current_probability,
        liquidity_score,
        bid_ask_spread,
        volatility_regime,
        volume_24h: raw.volume_24h,
        metadata: MbdMetadata::default(),
    }
}

/// §4.2: fetches the raw market and transforms it into an MBD. Failure
/// halts the graph (the only ingestion-class abort).
pub async fn ingestion_node(deps: &GraphDeps, condition_id: &str) -> PartialUpdate {
    match deps.market_client.fetch_market_data(condition_id).await {
        Ok(raw) => {
            let mbd = build_mbd(raw);
            let audit = AuditLogEntry::new("ingestion", serde_json::json!({ "market_id": mbd.market_id, "event_type": mbd.event_type }));
            PartialUpdate {
                mbd: Some(mbd),
                audit_log: vec![audit],
                ..Default::default()
            }
        }
        Err(err) => {
            let audit = AuditLogEntry::new("ingestion", serde_json::json!({ "error": err.to_string() }));
            PartialUpdate {
                ingestion_error: Some(err),
                audit_log: vec![audit],
                ..Default::default()
            }
        }
    }
}

/// Synthesized for ingestion-error paths where we never got a `RawMarket`.
pub fn ingestion_error_update(err: IngestionError) -> PartialUpdate {
    let audit = AuditLogEntry::new("ingestion", serde_json::json!({ "error": err.to_string() }));
    PartialUpdate {
        ingestion_error: Some(err),
        audit_log: vec![audit],
        ..Default::default()
    }
}

/// §4.3: retrieves per-agent memory context, degrading to empty on failure
/// or timeout (handled inside `retrieve_memory_context`).
pub async fn memory_node(deps: &GraphDeps, mbd: &MarketBriefingDocument) -> PartialUpdate {
    let mut contexts = HashMap::new();
    for agent in deps.registry.iter() {
        let context = retrieve_memory_context(deps.persistence.as_ref(), agent.agent_name(), &mbd.market_id, &deps.config.memory).await;
        contexts.insert(agent.agent_name().to_string(), context);
    }

    PartialUpdate {
        memory_contexts: contexts,
        audit_log: vec![AuditLogEntry::new("memory", serde_json::json!({ "agent_count": deps.registry.len() }))],
        ..Default::default()
    }
}

const SOCIAL_PLATFORMS: &[&str] = &["twitter", "reddit"];
const NEWS_WINDOW_HOURS: i64 = 72;

/// §4.4/§4.5: fetches shared external data once, then fans out every agent
/// concurrently through the harness (`join_all`), isolating each failure.
pub async fn fanout_node(deps: &GraphDeps, state: &GraphState, now: DateTime<Utc>) -> PartialUpdate {
    let mbd = match &state.mbd {
        Some(mbd) => mbd,
        None => return PartialUpdate::with_audit(AuditLogEntry::skipped("fanout", "no MBD available")),
    };

    let news = deps.external.fetch_news(&mbd.condition_id, &mbd.question, ChronoDuration::hours(NEWS_WINDOW_HOURS)).await;
    let polling = deps.external.fetch_polling(&mbd.condition_id, &mbd.question).await;
    let platforms: Vec<String> = SOCIAL_PLATFORMS.iter().map(|p| p.to_string()).collect();
    let social = deps.external.fetch_social(&mbd.condition_id, &mbd.question, &platforms).await;

    let empty_context = MemoryContext::default();
    let timeout = Duration::from_millis(deps.config.agents.timeout_ms);

    let runs = deps.registry.iter().map(|agent| {
        let memory_context = state.memory_contexts.get(agent.agent_name()).unwrap_or(&empty_context);
        let ctx = AgentContext {
            mbd,
            memory_context: &memory_context.text,
            news: &news,
            polling: polling.as_deref(),
            social: social.as_deref(),
            now,
        };
        deps.harness.run(agent, &ctx, timeout)
    });

    let outcomes = join_all(runs).await;

    let mut update = PartialUpdate::default();
    for outcome in outcomes {
        report_llm_call(deps.observability.as_ref(), &mbd.condition_id, &outcome).await;
        let audit = AuditLogEntry::new(
            format!("agent:{}", outcome.agent_name),
            serde_json::json!({
                "success": outcome.success(),
                "timed_out": outcome.timed_out,
                "duration_ms": outcome.duration.as_millis() as u64,
                "error": outcome.error.as_ref().map(|e| e.to_string()),
            }),
        );
        update.audit_log.push(audit);
        if let Some(signal) = outcome.signal {
            update.signals.push(signal);
        }
        if let Some(err) = outcome.error {
            update.agent_errors.push(err);
        }
    }
    update
}

/// §4.7.
pub fn thesis_node(deps: &GraphDeps, state: &GraphState) -> PartialUpdate {
    let mbd = match &state.mbd {
        Some(mbd) => mbd,
        None => return PartialUpdate::with_audit(AuditLogEntry::skipped("thesis", "no MBD available")),
    };

    let pair = analysis::construct_theses(&state.signals, mbd, &deps.config.signal_fusion, &deps.performance, 0.5);
    let audit = AuditLogEntry::new(
        "thesis",
        serde_json::json!({
            "bull_signal_count": pair.bull.supporting_signals.len(),
            "bear_signal_count": pair.bear.supporting_signals.len(),
        }),
    );

    PartialUpdate {
        bull_thesis: Some(pair.bull),
        bear_thesis: Some(pair.bear),
        audit_log: vec![audit],
        ..Default::default()
    }
}

/// §4.8.
pub fn cross_exam_node(state: &GraphState) -> PartialUpdate {
    let mbd = match &state.mbd {
        Some(mbd) => mbd,
        None => return PartialUpdate::with_audit(AuditLogEntry::skipped("cross_exam", "no MBD available")),
    };
    let (Some(bull), Some(bear)) = (&state.bull_thesis, &state.bear_thesis) else {
        return PartialUpdate::with_audit(AuditLogEntry::skipped("cross_exam", "theses not yet constructed"));
    };

    let bull_signals: Vec<&crate::models::AgentSignal> = state.signals.iter().filter(|s| bull.supporting_signals.contains(&s.agent_name)).collect();
    let bear_signals: Vec<&crate::models::AgentSignal> = state.signals.iter().filter(|s| bear.supporting_signals.contains(&s.agent_name)).collect();

    let debate = analysis::run_cross_examination(&bull_signals, &bear_signals, &state.signals, mbd);
    let audit = AuditLogEntry::new(
        "cross_exam",
        serde_json::json!({
            "bull_survival_score": debate.bull_survival_score,
            "bear_survival_score": debate.bear_survival_score,
        }),
    );

    PartialUpdate {
        debate: Some(debate),
        audit_log: vec![audit],
        ..Default::default()
    }
}

/// §4.9.
pub fn consensus_node(deps: &GraphDeps, state: &GraphState) -> PartialUpdate {
    let consensus = analysis::compute_consensus(&state.signals, &deps.config.signal_fusion, &deps.performance);
    let audit = AuditLogEntry::new(
        "consensus",
        serde_json::json!({
            "point": consensus.point,
            "disagreement_index": consensus.disagreement_index,
            "regime": consensus.regime,
        }),
    );

    PartialUpdate {
        consensus: Some(consensus),
        audit_log: vec![audit],
        ..Default::default()
    }
}

/// §4.10.
pub fn recommendation_node(deps: &GraphDeps, state: &GraphState) -> PartialUpdate {
    let (Some(mbd), Some(consensus), Some(bull), Some(bear)) = (&state.mbd, &state.consensus, &state.bull_thesis, &state.bear_thesis) else {
        return PartialUpdate::with_audit(AuditLogEntry::skipped("recommendation", "missing upstream artifacts"));
    };

    let recommendation = analysis::build_recommendation(consensus, mbd, bull, bear, &deps.config.consensus);
    let audit = AuditLogEntry::new(
        "recommendation",
        serde_json::json!({
            "action": recommendation.action,
            "expected_value": recommendation.expected_value,
        }),
    );

    PartialUpdate {
        recommendation: Some(recommendation),
        audit_log: vec![audit],
        ..Default::default()
    }
}
