//! Graph runner (§4.1): sequences the fixed node order, merges partial
//! updates, checkpoints at each node boundary, and enforces the abort
//! policy (§7) — only ingestion failure, configuration failure, or
//! insufficient surviving signals stop a run short of a recommendation.

use chrono::{DateTime, Utc};

use crate::error::GraphError;
use crate::models::{AuditLogEntry, TradeRecommendation};

use super::nodes::{consensus_node, cross_exam_node, fanout_node, ingestion_node, memory_node, recommendation_node, thesis_node, GraphDeps};
use super::state::GraphState;

/// Default recursion/step limit (§4.1). This concrete graph has no cycles —
/// the limit exists as the specified infrastructure guard, exercised by
/// `step_limit_of_one_aborts_before_ingestion` below.
pub const DEFAULT_STEP_LIMIT: usize = 25;

#[derive(Debug, Clone)]
pub struct GraphOutcome {
    pub recommendation: Option<TradeRecommendation>,
    pub audit_log: Vec<AuditLogEntry>,
}

/// `GraphError` alone loses the partial audit trail (§7: "audit entries are
/// always available" even on an aborted run), so the runner pairs it with
/// whatever the state accumulated before the abort.
#[derive(Debug, Clone)]
pub struct GraphRunError {
    pub error: GraphError,
    pub audit_log: Vec<AuditLogEntry>,
}

impl std::fmt::Display for GraphRunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for GraphRunError {}

async fn checkpoint(deps: &GraphDeps, state: &GraphState, stage: &str) {
    if let Some(mbd) = &state.mbd {
        if let Err(err) = deps.persistence.upsert_market(mbd).await {
            tracing::warn!(condition_id = %state.condition_id, stage, error = %err, "checkpoint upsert_market failed");
        }
    }
    let summary = serde_json::json!({ "stage": stage, "audit_log_len": state.audit_log.len() }).to_string();
    if let Err(err) = deps.persistence.record_analysis(&state.condition_id, &summary).await {
        tracing::warn!(condition_id = %state.condition_id, stage, error = %err, "checkpoint record_analysis failed");
    }
}

pub async fn run_graph(deps: &GraphDeps, condition_id: &str, now: DateTime<Utc>) -> Result<GraphOutcome, GraphRunError> {
    run_graph_with_step_limit(deps, condition_id, now, DEFAULT_STEP_LIMIT).await
}

pub async fn run_graph_with_step_limit(deps: &GraphDeps, condition_id: &str, now: DateTime<Utc>, step_limit: usize) -> Result<GraphOutcome, GraphRunError> {
    let mut state = GraphState::new(condition_id);
    let mut steps: usize = 0;

    macro_rules! take_step {
        ($state:expr) => {{
            steps += 1;
            if steps > step_limit {
                return Err(GraphRunError {
                    error: GraphError::InsufficientSignals {
                        required: deps.config.agents.min_agents_required,
                        got: $state.signals.len(),
                    },
                    audit_log: $state.audit_log.clone(),
                });
            }
        }};
    }

    take_step!(state);
    state.apply(ingestion_node(deps, condition_id).await);
    checkpoint(deps, &state, "ingestion").await;

    if let Some(err) = state.ingestion_error.clone() {
        return Err(GraphRunError {
            error: GraphError::Ingestion(err),
            audit_log: state.audit_log,
        });
    }
    let mbd = state.mbd.clone().expect("mbd is set whenever ingestion_error is absent");

    take_step!(state);
    state.apply(memory_node(deps, &mbd).await);
    checkpoint(deps, &state, "memory").await;

    take_step!(state);
    state.apply(fanout_node(deps, &state, now).await);
    checkpoint(deps, &state, "fanout").await;

    if state.signals.len() < deps.config.agents.min_agents_required {
        return Err(GraphRunError {
            error: GraphError::InsufficientSignals {
                required: deps.config.agents.min_agents_required,
                got: state.signals.len(),
            },
            audit_log: state.audit_log,
        });
    }

    take_step!(state);
    state.apply(thesis_node(deps, &state));

    take_step!(state);
    state.apply(cross_exam_node(&state));

    take_step!(state);
    state.apply(consensus_node(deps, &state));

    take_step!(state);
    state.apply(recommendation_node(deps, &state));
    checkpoint(deps, &state, "recommendation").await;

    if let Some(recommendation) = &state.recommendation {
        if let Err(err) = deps.persistence.store_recommendation(condition_id, recommendation).await {
            tracing::warn!(condition_id, error = %err, "store_recommendation failed");
        }
    }
    if let Err(err) = deps.persistence.store_agent_signals(condition_id, &state.signals).await {
        tracing::warn!(condition_id, error = %err, "store_agent_signals failed");
    }

    Ok(GraphOutcome {
        recommendation: state.recommendation,
        audit_log: state.audit_log,
    })
}
