//! LLM invocation and structured-output validation.
//!
//! Generalizes the teacher's single free-text `DecisionDsl` line-protocol
//! (`vault::llm::parse_decision_dsl`) into a per-agent declared output shape
//! with field-level validation and repair, per §6's "typed LLM outputs via
//! schema-validated calls" redesign note.

mod openrouter;
mod schema;

pub use openrouter::OpenRouterProvider;
pub use schema::{validate_probability_field, AgentOutputSchema, SchemaError};
