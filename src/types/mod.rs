//! Type definitions for workshop-pilot
//!
//! Stage results, per-persona artifacts, group summaries and the final
//! report. All of them are plain serde records shared by the simulator,
//! the orchestrator and the aggregator.

mod report;
mod result;
mod summary;

pub use report::*;
pub use result::*;
pub use summary::*;
