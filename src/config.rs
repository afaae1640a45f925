//! Process-wide configuration.
//!
//! Deliberately an enumerated record, not a dynamic option bag (§9 "dynamic
//! per-agent configuration" redesign flag): every recognized option has a
//! named field, `#[serde(deny_unknown_fields)]` rejects typos at startup
//! (a configuration error refuses to start the process, §7), and the whole
//! tree is loadable from a TOML file with env var overrides, in the
//! teacher's `Config::from_env` idiom (`src/models.rs` in the teacher).

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AgentsConfig {
    pub timeout_ms: u64,
    pub min_agents_required: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            min_agents_required: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConsensusConfig {
    pub min_edge_threshold: f64,
    pub high_disagreement_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_edge_threshold: 0.05,
            high_disagreement_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SignalFusionConfig {
    pub base_weights: HashMap<String, f64>,
    pub context_adjustments: HashMap<String, f64>,
    pub conflict_threshold: f64,
    pub alignment_bonus: f64,
}

impl Default for SignalFusionConfig {
    fn default() -> Self {
        Self {
            base_weights: HashMap::new(),
            context_adjustments: HashMap::new(),
            conflict_threshold: 0.15,
            alignment_bonus: 0.15,
        }
    }
}

impl SignalFusionConfig {
    pub fn base_weight(&self, agent_name: &str) -> f64 {
        self.base_weights.get(agent_name).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PerformanceTrackingConfig {
    pub enabled: bool,
    pub evaluate_on_resolution: bool,
    pub min_sample_size: u32,
}

impl Default for PerformanceTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            evaluate_on_resolution: true,
            min_sample_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    Ttl,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub default_ttl_secs: i64,
    pub stale_ttl_secs: i64,
    pub eviction_policy: EvictionPolicy,
    pub compression_threshold_bytes: usize,
    pub enable_compression: bool,
    pub warming_enabled: bool,
    pub key_optimization: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            default_ttl_secs: 900,
            stale_ttl_secs: 3_600,
            eviction_policy: EvictionPolicy::Lru,
            compression_threshold_bytes: 4_096,
            enable_compression: false,
            warming_enabled: false,
            key_optimization: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_size_ms: u64,
    pub daily_quota: u32,
    /// Percent (0..1) of capacity below which a small smoothing delay is
    /// induced before declining the next request.
    pub buffer: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window_size_ms: 60_000,
            daily_quota: 5_000,
            buffer: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExternalSourceConfig {
    pub provider: Option<String>,
    pub cache_ttl_secs: i64,
    pub max_items: usize,
}

impl Default for ExternalSourceConfig {
    fn default() -> Self {
        Self {
            provider: None,
            cache_ttl_secs: 900,
            max_items: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExternalDataConfig {
    pub news: ExternalSourceConfig,
    pub polling: ExternalSourceConfig,
    pub social: ExternalSourceConfig,
}

impl Default for ExternalDataConfig {
    fn default() -> Self {
        Self {
            news: ExternalSourceConfig::default(),
            polling: ExternalSourceConfig::default(),
            social: ExternalSourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MemoryConfig {
    /// Signals retrieved per agent, oldest-to-newest (§4.3 specifies k∈[3,5]).
    pub signals_per_agent: usize,
    pub max_context_chars: usize,
    pub timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            signals_per_agent: 5,
            max_context_chars: 2_000,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub max_markets_per_cycle: usize,
    pub update_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5 * 60_000,
            max_markets_per_cycle: 20,
            update_interval_ms: 15 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub consensus: ConsensusConfig,
    pub signal_fusion: SignalFusionConfig,
    pub performance_tracking: PerformanceTrackingConfig,
    pub memory: MemoryConfig,
    pub external_data: ExternalDataConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agents: AgentsConfig::default(),
            consensus: ConsensusConfig::default(),
            signal_fusion: SignalFusionConfig::default(),
            performance_tracking: PerformanceTrackingConfig::default(),
            memory: MemoryConfig::default(),
            external_data: ExternalDataConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, then overlay an optional TOML file. An unrecognized
    /// key anywhere in the tree is a startup-refusing `ConfigError`.
    pub fn load(toml_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Some(path) = toml_path {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Parse(format!("reading {}: {e}", path.display())))?;
            config = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        }

        if let Ok(v) = std::env::var("ORACLE_AGENTS_TIMEOUT_MS") {
            config.agents.timeout_ms = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "agents.timeout_ms".into(),
                    reason: "not a u64".into(),
                })?;
        }
        if let Ok(v) = std::env::var("ORACLE_MONITOR_INTERVAL_MS") {
            config.monitor.interval_ms = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "monitor.interval_ms".into(),
                    reason: "not a u64".into(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.min_agents_required == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agents.min_agents_required".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.consensus.min_edge_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "consensus.min_edge_threshold".into(),
                reason: "must be in [0,1]".into(),
            });
        }
        if !(1..=20).contains(&self.memory.signals_per_agent) {
            return Err(ConfigError::InvalidValue {
                field: "memory.signals_per_agent".into(),
                reason: "must be in [1,20]".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let toml_src = "bogus_top_level_key = 1\n";
        let err = toml::from_str::<Config>(toml_src).unwrap_err();
        assert!(err.to_string().len() > 0);
    }

    #[test]
    fn zero_min_agents_required_is_invalid() {
        let mut config = Config::default();
        config.agents.min_agents_required = 0;
        assert!(config.validate().is_err());
    }
}
