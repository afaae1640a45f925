//! `rusqlite`-backed `Persistence` (§6). Grounded in the teacher's
//! `DbSignalStorage` (`src/signals/db_storage.rs`): a `parking_lot::Mutex`
//! around one `Connection`, `INSERT ... ON CONFLICT DO UPDATE` for
//! idempotent upserts, schema applied via `execute_batch` on open.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::interfaces::Persistence;
use crate::models::{AgentPerformanceMetrics, AgentSignal, MarketBriefingDocument, TradeRecommendation};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS markets (
    condition_id TEXT PRIMARY KEY,
    market_id TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS recommendations (
    condition_id TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market_key TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agent_signals_lookup
    ON agent_signals(market_key, agent_name, timestamp DESC);

CREATE TABLE IF NOT EXISTS analysis_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    condition_id TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_performance (
    agent_name TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// `rusqlite::Connection` is `Send` but not `Sync`; a single mutex-guarded
/// connection is the teacher's answer to sharing it across the tokio
/// runtime's worker threads.
pub struct SqlitePersistence {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePersistence {
    pub fn open(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn upsert_market(&self, mbd: &MarketBriefingDocument) -> anyhow::Result<()> {
        let payload = serde_json::to_string(mbd)?;
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO markets (condition_id, market_id, payload_json, resolved, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(condition_id) DO UPDATE SET
                market_id = excluded.market_id,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![mbd.condition_id, mbd.market_id, payload, now],
        )?;
        Ok(())
    }

    async fn store_recommendation(&self, condition_id: &str, recommendation: &TradeRecommendation) -> anyhow::Result<()> {
        let payload = serde_json::to_string(recommendation)?;
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO recommendations (condition_id, payload_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(condition_id) DO UPDATE SET
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![condition_id, payload, now],
        )?;
        Ok(())
    }

    async fn store_agent_signals(&self, condition_id: &str, signals: &[AgentSignal]) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        for signal in signals {
            let payload = serde_json::to_string(signal)?;
            conn.execute(
                "INSERT INTO agent_signals (market_key, agent_name, timestamp, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![condition_id, signal.agent_name, signal.timestamp.timestamp_millis(), payload],
            )?;
        }
        Ok(())
    }

    async fn record_analysis(&self, condition_id: &str, summary: &str) -> anyhow::Result<()> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO analysis_log (condition_id, summary, created_at) VALUES (?1, ?2, ?3)",
            params![condition_id, summary, now],
        )?;
        Ok(())
    }

    async fn get_markets_for_update(&self, interval_ms: u64) -> anyhow::Result<Vec<String>> {
        let cutoff = Utc::now().timestamp_millis() - interval_ms as i64;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT condition_id FROM markets WHERE resolved = 0 AND updated_at <= ?1 ORDER BY updated_at ASC",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn mark_market_resolved(&self, condition_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        conn.execute("UPDATE markets SET resolved = 1 WHERE condition_id = ?1", params![condition_id])?;
        Ok(())
    }

    async fn get_latest_recommendation(&self, condition_id: &str) -> anyhow::Result<Option<TradeRecommendation>> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row("SELECT payload_json FROM recommendations WHERE condition_id = ?1", params![condition_id], |row| row.get(0))
            .optional()?;
        Ok(match payload {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    async fn get_recent_signals(&self, agent_name: &str, market_id: &str, k: usize) -> anyhow::Result<Vec<AgentSignal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT payload_json FROM agent_signals
             WHERE market_key = ?1 AND agent_name = ?2
             ORDER BY timestamp DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![market_id, agent_name, k as i64], |row| row.get::<_, String>(0))?;
        let mut signals = Vec::new();
        for row in rows {
            signals.push(serde_json::from_str(&row?)?);
        }
        signals.reverse(); // oldest -> newest, matching the memory node's expectation
        Ok(signals)
    }

    async fn get_performance(&self, agent_name: &str) -> anyhow::Result<Option<AgentPerformanceMetrics>> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row("SELECT payload_json FROM agent_performance WHERE agent_name = ?1", params![agent_name], |row| row.get(0))
            .optional()?;
        Ok(match payload {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    async fn upsert_performance(&self, metrics: &AgentPerformanceMetrics) -> anyhow::Result<()> {
        let payload = serde_json::to_string(metrics)?;
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_performance (agent_name, payload_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(agent_name) DO UPDATE SET
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![metrics.agent_name, payload, now],
        )?;
        Ok(())
    }

    async fn all_performance(&self) -> anyhow::Result<Vec<AgentPerformanceMetrics>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT payload_json FROM agent_performance")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}
