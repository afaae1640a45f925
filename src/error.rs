//! Typed error taxonomy for the analysis core.
//!
//! Mirrors the split the rest of this ecosystem uses: `thiserror` enums for
//! anything a caller is expected to match on, `anyhow` at the outer glue
//! (monitor loop, CLI) where an error is only ever logged and reported.

use thiserror::Error;

/// Errors surfaced by the ingestion node. Any of these halts the graph run.
#[derive(Debug, Clone, Error)]
pub enum IngestionError {
    #[error("market data API unavailable")]
    ApiUnavailable,
    #[error("rate limit exceeded fetching market data")]
    RateLimitExceeded,
    #[error("invalid market id: {0}")]
    InvalidMarketId(String),
}

/// Errors that refuse to start the process (recognized-but-invalid config,
/// or an unrecognized key).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("unrecognized config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Isolated agent failure. Never aborts a run; counted in `agentErrors`.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("agent {agent} timed out after {elapsed_ms}ms")]
    Timeout { agent: String, elapsed_ms: u64 },
    #[error("agent {agent} failed: {reason}")]
    Failed { agent: String, reason: String },
    #[error("agent {agent} produced an invalid signal: {reason}")]
    InvalidSignal { agent: String, reason: String },
}

/// Top-level graph run outcome error. Only these three variants can abort a
/// run per the propagation policy; everything else is locally recovered.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),
    #[error("configuration invalid: {0}")]
    Configuration(#[from] ConfigError),
    #[error("insufficient surviving signals: required {required}, got {got}")]
    InsufficientSignals { required: usize, got: usize },
}

/// Errors from the external-data layer's provider calls, used to classify
/// retryability in the retry policy.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider not configured")]
    NotConfigured,
}

impl ProviderError {
    /// Retryable classes: 5xx, 429, network, timeout. Non-retryable: 4xx
    /// other than 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status >= 500 || *status == 429,
            ProviderError::Network(_) | ProviderError::Timeout => true,
            ProviderError::NotConfigured => false,
        }
    }
}
