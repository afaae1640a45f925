//! Graph state (§4.1): one plain struct threaded through every node, not a
//! dynamic map (§9 redesign flag, applied consistently with the rest of the
//! data model). Nodes return a [`PartialUpdate`]; the runner merges it with
//! fixed per-field rules: scalars replace, sequences append, mappings merge
//! by key (later wins).

use std::collections::HashMap;

use crate::error::{AgentError, IngestionError};
use crate::memory::MemoryContext;
use crate::models::{AgentSignal, AuditLogEntry, ConsensusProbability, DebateRecord, MarketBriefingDocument, Thesis, TradeRecommendation};

#[derive(Debug, Clone)]
pub struct GraphState {
    pub condition_id: String,
    pub mbd: Option<MarketBriefingDocument>,
    pub memory_contexts: HashMap<String, MemoryContext>,
    pub signals: Vec<AgentSignal>,
    pub agent_errors: Vec<AgentError>,
    pub bull_thesis: Option<Thesis>,
    pub bear_thesis: Option<Thesis>,
    pub debate: Option<DebateRecord>,
    pub consensus: Option<ConsensusProbability>,
    pub recommendation: Option<TradeRecommendation>,
    pub audit_log: Vec<AuditLogEntry>,
    pub ingestion_error: Option<IngestionError>,
}

impl GraphState {
    pub fn new(condition_id: impl Into<String>) -> Self {
        Self {
            condition_id: condition_id.into(),
            mbd: None,
            memory_contexts: HashMap::new(),
            signals: Vec::new(),
            agent_errors: Vec::new(),
            bull_thesis: None,
            bear_thesis: None,
            debate: None,
            consensus: None,
            recommendation: None,
            audit_log: Vec::new(),
            ingestion_error: None,
        }
    }

    pub fn apply(&mut self, update: PartialUpdate) {
        if let Some(mbd) = update.mbd {
            self.mbd = Some(mbd);
        }
        for (agent_name, context) in update.memory_contexts {
            self.memory_contexts.insert(agent_name, context);
        }
        self.signals.extend(update.signals);
        self.agent_errors.extend(update.agent_errors);
        if let Some(thesis) = update.bull_thesis {
            self.bull_thesis = Some(thesis);
        }
        if let Some(thesis) = update.bear_thesis {
            self.bear_thesis = Some(thesis);
        }
        if let Some(debate) = update.debate {
            self.debate = Some(debate);
        }
        if let Some(consensus) = update.consensus {
            self.consensus = Some(consensus);
        }
        if let Some(recommendation) = update.recommendation {
            self.recommendation = Some(recommendation);
        }
        self.audit_log.extend(update.audit_log);
        if let Some(err) = update.ingestion_error {
            self.ingestion_error = Some(err);
        }
    }
}

/// What one node returns (§4.1). Every field is additive/optional; a node
/// that has nothing to say about a field leaves it at its `Default`.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
    pub mbd: Option<MarketBriefingDocument>,
    pub memory_contexts: HashMap<String, MemoryContext>,
    pub signals: Vec<AgentSignal>,
    pub agent_errors: Vec<AgentError>,
    pub bull_thesis: Option<Thesis>,
    pub bear_thesis: Option<Thesis>,
    pub debate: Option<DebateRecord>,
    pub consensus: Option<ConsensusProbability>,
    pub recommendation: Option<TradeRecommendation>,
    pub audit_log: Vec<AuditLogEntry>,
    pub ingestion_error: Option<IngestionError>,
}

impl PartialUpdate {
    pub fn with_audit(entry: AuditLogEntry) -> Self {
        Self {
            audit_log: vec![entry],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditLogEntry;

    #[test]
    fn scalar_update_replaces() {
        let mut state = GraphState::new("cond-1");
        let mbd = crate::models::test_support::sample_mbd();
        state.apply(PartialUpdate {
            mbd: Some(mbd.clone()),
            ..Default::default()
        });
        assert_eq!(state.mbd.unwrap().market_id, mbd.market_id);
    }

    #[test]
    fn sequence_updates_append_across_calls() {
        let mut state = GraphState::new("cond-1");
        state.apply(PartialUpdate::with_audit(AuditLogEntry::new("ingestion", serde_json::json!({}))));
        state.apply(PartialUpdate::with_audit(AuditLogEntry::new("memory", serde_json::json!({}))));
        assert_eq!(state.audit_log.len(), 2);
        assert_eq!(state.audit_log[0].stage, "ingestion");
        assert_eq!(state.audit_log[1].stage, "memory");
    }

    #[test]
    fn mapping_update_merges_by_key_later_wins() {
        let mut state = GraphState::new("cond-1");
        let mut first = HashMap::new();
        first.insert("agent_a".to_string(), crate::memory::MemoryContext::default());
        state.apply(PartialUpdate {
            memory_contexts: first,
            ..Default::default()
        });
        let mut second = HashMap::new();
        let mut ctx = crate::memory::MemoryContext::default();
        ctx.text = "updated".to_string();
        second.insert("agent_a".to_string(), ctx);
        state.apply(PartialUpdate {
            memory_contexts: second,
            ..Default::default()
        });
        assert_eq!(state.memory_contexts.get("agent_a").unwrap().text, "updated");
    }
}
