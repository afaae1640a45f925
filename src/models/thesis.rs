use crate::models::mbd::KeyCatalyst;
use serde::{Deserialize, Serialize};

/// A structured bull or bear argument (§3, §4.7). A run always produces
/// exactly one bull and one bear thesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thesis {
    pub claims: Vec<String>,
    pub key_catalysts: Vec<KeyCatalyst>,
    pub supporting_signals: Vec<String>,
    pub assumptions: Vec<String>,
    pub implied_probability: f64,
}
