//! Per-persona workshop simulation
//!
//! A persona walks the stage catalog strictly in order. Each stage prompt
//! carries a bounded digest of the previous stages, and the run stops at
//! the first early exit, unexpected error or observed cancellation.

mod digest;
mod runner;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use runner::StageSimulator;

/// Shared cancellation signal, checked between stages and personas
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
