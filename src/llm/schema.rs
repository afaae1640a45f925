//! Declared output shapes for agent LLM calls.
//!
//! Each agent parses the model's JSON text into its own typed output struct
//! (see `crate::agents::*`), then calls into these shared validators for the
//! fields common across agents (probabilities, confidences). A field that
//! fails validation is either repaired (clamped) when the repair is
//! unambiguous, or rejected — surfacing as `AgentError::InvalidSignal`.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("field {field} missing from model output")]
    Missing { field: String },
    #[error("field {field} could not be parsed as the declared type: {detail}")]
    TypeMismatch { field: String, detail: String },
    #[error("field {field} out of range and could not be repaired: {detail}")]
    Unrepairable { field: String, detail: String },
}

/// Declares the JSON schema name + required top-level keys an agent expects
/// back from the model. Used for documentation/telemetry; the actual
/// decoding happens via `serde_json` into the agent's typed output struct.
pub struct AgentOutputSchema {
    pub name: &'static str,
    pub required_fields: &'static [&'static str],
}

/// A probability-shaped field (`[0,1]`) is repaired by clamping when it is
/// only slightly out of range (models occasionally emit 1.0-epsilon-off
/// values or percentages instead of fractions); anything further out is
/// rejected rather than silently repaired.
pub fn validate_probability_field(field: &str, value: f64) -> Result<f64, SchemaError> {
    if (0.0..=1.0).contains(&value) {
        return Ok(value);
    }
    // Common model mistake: returning a percentage (e.g. 65.0 instead of 0.65).
    if (0.0..=100.0).contains(&value) {
        return Ok(value / 100.0);
    }
    if value.is_finite() && (-0.02..=1.02).contains(&value) {
        return Ok(value.clamp(0.0, 1.0));
    }
    Err(SchemaError::Unrepairable {
        field: field.to_string(),
        detail: format!("{value} is not a repairable probability"),
    })
}
