use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct LlmUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub latency_ms: u64,
}

/// Consumed contract for the LLM provider (§6): `invokeStructured(messages,
/// outputSchema) → typedObject`. The production adapter
/// ([`crate::llm::OpenRouterProvider`]) validates/repairs the response
/// against the caller's schema before returning; invalid output that cannot
/// be repaired surfaces as an `AgentError`, never a panic.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the raw model text plus usage; schema validation happens one
    /// layer up in [`crate::llm::schema`] so every agent can declare its own
    /// output shape without the trait knowing about it.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
    ) -> anyhow::Result<(String, LlmUsage)>;
}
