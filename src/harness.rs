//! Agent harness (§4.5): the single call surface every agent goes through.
//! `invokeLLM` is identical across agents, so it lives here once instead of
//! in each agent — mirrors the teacher's `signals::runner` pattern of a
//! shared execution shell around per-detector logic, with
//! `tokio::time::timeout` standing in for the teacher's deadline wrapper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agents::{Agent, AgentContext};
use crate::error::AgentError;
use crate::interfaces::{LlmProvider, LlmUsage, ObservabilitySink};
use crate::models::AgentSignal;
use crate::performance::PerformanceTracker;

/// Result of one `harness.run()` call (§4.5): always returned, never a
/// propagated error — a failing agent is isolated, not fatal to the run.
#[derive(Debug, Clone)]
pub struct HarnessOutcome {
    pub agent_name: String,
    pub signal: Option<AgentSignal>,
    pub error: Option<AgentError>,
    pub timed_out: bool,
    pub duration: Duration,
    pub usage: Option<LlmUsage>,
}

impl HarnessOutcome {
    pub fn success(&self) -> bool {
        self.signal.is_some()
    }
}

pub struct AgentHarness {
    llm: Arc<dyn LlmProvider>,
    performance: Arc<PerformanceTracker>,
}

impl AgentHarness {
    pub fn new(llm: Arc<dyn LlmProvider>, performance: Arc<PerformanceTracker>) -> Self {
        Self { llm, performance }
    }

    /// Runs one agent to completion or timeout. Populates performance
    /// metrics as a side effect regardless of outcome (§4.12). The caller
    /// (the fanout node) is responsible for forwarding `usage` to the
    /// observability sink along with the `condition_id` it already has in
    /// scope — the harness itself is condition-agnostic.
    pub async fn run(&self, agent: &Arc<dyn Agent>, ctx: &AgentContext<'_>, timeout: Duration) -> HarnessOutcome {
        let agent_name = agent.agent_name().to_string();
        let start = Instant::now();

        let invoked = tokio::time::timeout(timeout, self.invoke(agent, ctx)).await;
        let duration = start.elapsed();

        match invoked {
            Ok(Ok((signal, usage))) => {
                self.performance.record_success(&agent_name, signal.confidence, duration);
                HarnessOutcome {
                    agent_name,
                    signal: Some(signal),
                    error: None,
                    timed_out: false,
                    duration,
                    usage: Some(usage),
                }
            }
            Ok(Err((err, usage))) => {
                self.performance.record_failure(&agent_name);
                HarnessOutcome {
                    agent_name,
                    signal: None,
                    error: Some(err),
                    timed_out: false,
                    duration,
                    usage,
                }
            }
            Err(_elapsed) => {
                self.performance.record_failure(&agent_name);
                HarnessOutcome {
                    error: Some(AgentError::Timeout {
                        agent: agent_name.clone(),
                        elapsed_ms: duration.as_millis() as u64,
                    }),
                    agent_name,
                    signal: None,
                    timed_out: true,
                    duration,
                    usage: None,
                }
            }
        }
    }

    /// `prepareInput → invokeLLM → postProcess` (§4.4), with the inner LLM
    /// call carrying its own timeout hint so the transport layer doesn't
    /// hang well past the harness deadline.
    async fn invoke(&self, agent: &Arc<dyn Agent>, ctx: &AgentContext<'_>) -> Result<(AgentSignal, LlmUsage), (AgentError, Option<LlmUsage>)> {
        let user_prompt = agent.build_user_prompt(ctx);
        let (raw_output, usage) = self
            .llm
            .complete(agent.system_prompt(), &user_prompt, Duration::from_secs(30))
            .await
            .map_err(|e| {
                (
                    AgentError::Failed {
                        agent: agent.agent_name().to_string(),
                        reason: e.to_string(),
                    },
                    None,
                )
            })?;

        agent.parse_output(&raw_output, ctx).map(|signal| (signal, usage.clone())).map_err(|e| (e, Some(usage)))
    }
}

/// Reports one agent invocation's latency/token usage through the
/// observability sink (§6 "each LLM call... is recorded"). Separated from
/// `AgentHarness::run` because only the caller (the fanout node) knows the
/// `condition_id` a given run belongs to.
pub async fn report_llm_call(sink: &dyn ObservabilitySink, condition_id: &str, outcome: &HarnessOutcome) {
    let total_tokens = outcome.usage.as_ref().and_then(|u| u.total_tokens);
    sink.record_llm_call(condition_id, &outcome.agent_name, outcome.duration.as_millis() as u64, total_tokens).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ProbabilityBaselineAgent;
    use crate::clock::SystemClock;
    use crate::config::PerformanceTrackingConfig;
    use crate::models::test_support::sample_mbd;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubLlm {
        response: String,
        delay: Duration,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _system_prompt: &str, _user_prompt: &str, _timeout: Duration) -> anyhow::Result<(String, crate::interfaces::LlmUsage)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok((self.response.clone(), crate::interfaces::LlmUsage::default()))
        }
    }

    fn tracker() -> Arc<PerformanceTracker> {
        Arc::new(PerformanceTracker::new(
            Arc::new(SystemClock),
            &PerformanceTrackingConfig {
                enabled: true,
                evaluate_on_resolution: true,
                min_sample_size: 10,
            },
        ))
    }

    #[tokio::test]
    async fn successful_run_returns_signal_and_records_performance() {
        let llm = Arc::new(StubLlm {
            response: r#"{"fair_probability":0.6,"confidence":0.5,"key_drivers":["d1"],"risk_factors":[]}"#.to_string(),
            delay: Duration::from_millis(1),
            calls: AtomicU32::new(0),
        });
        let perf = tracker();
        let harness = AgentHarness::new(llm, perf.clone());
        let agent: Arc<dyn Agent> = Arc::new(ProbabilityBaselineAgent);
        let mbd = sample_mbd();
        let ctx = AgentContext {
            mbd: &mbd,
            memory_context: "",
            news: &[],
            polling: None,
            social: None,
            now: chrono::Utc::now(),
        };

        let outcome = harness.run(&agent, &ctx, Duration::from_secs(1)).await;
        assert!(outcome.success());
        assert!(!outcome.timed_out);
        assert_eq!(perf.get("probability_baseline").total_analyses, 1);
    }

    #[tokio::test]
    async fn slow_agent_times_out_without_propagating() {
        let llm = Arc::new(StubLlm {
            response: r#"{"fair_probability":0.6,"confidence":0.5,"key_drivers":["d1"],"risk_factors":[]}"#.to_string(),
            delay: Duration::from_millis(200),
            calls: AtomicU32::new(0),
        });
        let perf = tracker();
        let harness = AgentHarness::new(llm, perf);
        let agent: Arc<dyn Agent> = Arc::new(ProbabilityBaselineAgent);
        let mbd = sample_mbd();
        let ctx = AgentContext {
            mbd: &mbd,
            memory_context: "",
            news: &[],
            polling: None,
            social: None,
            now: chrono::Utc::now(),
        };

        let outcome = harness.run(&agent, &ctx, Duration::from_millis(10)).await;
        assert!(!outcome.success());
        assert!(outcome.timed_out);
        assert!(matches!(outcome.error, Some(AgentError::Timeout { .. })));
    }

    #[tokio::test]
    async fn invalid_json_isolated_as_agent_error() {
        let llm = Arc::new(StubLlm {
            response: "not json".to_string(),
            delay: Duration::from_millis(1),
            calls: AtomicU32::new(0),
        });
        let perf = tracker();
        let harness = AgentHarness::new(llm, perf);
        let agent: Arc<dyn Agent> = Arc::new(ProbabilityBaselineAgent);
        let mbd = sample_mbd();
        let ctx = AgentContext {
            mbd: &mbd,
            memory_context: "",
            news: &[],
            polling: None,
            social: None,
            now: chrono::Utc::now(),
        };

        let outcome = harness.run(&agent, &ctx, Duration::from_secs(1)).await;
        assert!(!outcome.success());
        assert!(!outcome.timed_out);
        assert!(matches!(outcome.error, Some(AgentError::InvalidSignal { .. })));
    }
}
