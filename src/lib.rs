//! Prediction-market consensus analysis core: ingests a market, fans a
//! question out to a panel of LLM-backed agents, cross-examines and fuses
//! their signals into a single probability, and turns that into a trade
//! recommendation. See `SPEC_FULL.md` for the full module map.

pub mod agents;
pub mod analysis;
pub mod clock;
pub mod config;
pub mod error;
pub mod external;
pub mod graph;
pub mod harness;
pub mod interfaces;
pub mod llm;
pub mod market;
pub mod memory;
pub mod models;
pub mod performance;
pub mod persistence;
pub mod monitor;
