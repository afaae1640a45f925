//! Workflow graph (§4.1): fixed node order over a plain state struct,
//! merged through [`state::PartialUpdate`] and driven by [`runner::run_graph`].

mod nodes;
mod runner;
mod state;

pub use nodes::{
    consensus_node, cross_exam_node, fanout_node, ingestion_error_update, ingestion_node, memory_node, recommendation_node, thesis_node, GraphDeps,
};
pub use runner::{run_graph, run_graph_with_step_limit, GraphOutcome, GraphRunError, DEFAULT_STEP_LIMIT};
pub use state::{GraphState, PartialUpdate};
