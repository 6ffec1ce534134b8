//! Group orchestration
//!
//! Partitions the selected personas into groups, runs each group on a
//! bounded worker pool behind a shared call throttle, and persists one
//! artifact per persona plus a summary per group.

mod group;
pub mod store;
mod throttle;

pub use group::{GroupOrchestrator, RunSummary};
pub use store::ArtifactStore;
pub use throttle::ThrottledBackend;
