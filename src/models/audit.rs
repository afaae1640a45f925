use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{stage, timestamp, data}` appended by each node (§3). The log is
/// append-only across a run; order matches execution (property 13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub skipped: bool,
}

impl AuditLogEntry {
    pub fn new(stage: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            stage: stage.into(),
            timestamp: Utc::now(),
            data,
            skipped: false,
        }
    }

    pub fn skipped(stage: impl Into<String>, reason: &str) -> Self {
        Self {
            stage: stage.into(),
            timestamp: Utc::now(),
            data: serde_json::json!({ "reason": reason }),
            skipped: true,
        }
    }
}

/// Checks property 13's "monotonic in timestamp per producer" requirement
/// for a single producer's own slice of the log.
pub fn is_monotonic(entries: &[AuditLogEntry]) -> bool {
    entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
