//! Autonomous monitor (§4.11): the scheduler that drives periodic analysis
//! cycles over the workflow graph.

mod cycle;
mod quota;
mod scheduler;

pub use cycle::{run_cycle, CycleReport};
pub use quota::{spawn_quota_reset_task, QuotaManager};
pub use scheduler::Monitor;
