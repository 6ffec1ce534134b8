//! Per-persona simulation state machine
//!
//! `Stage(1) -> Stage(2) -> ... -> Stage(N) -> Completed`, with
//! `DroppedOut`, `Errored` and `Interrupted` reachable from any stage.

use crate::types::SimulationOutcome;

/// Where a persona's run currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationState {
    /// About to evaluate this stage
    Stage(u32),
    Completed,
    DroppedOut(u32),
    Errored { stage: u32, message: String },
    /// Cancelled with this many stages finished
    Interrupted(u32),
}

/// What happened at the current stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// A result was recorded with wouldContinue = true
    Continued,
    /// A result was recorded with wouldContinue = false
    Declined,
    /// The stage could not be evaluated at all
    Failed(String),
    /// Cancellation observed before the stage started
    Cancelled,
}

impl SimulationState {
    pub fn initial() -> Self {
        SimulationState::Stage(1)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SimulationState::Stage(_))
    }

    /// Apply an event for a catalog of `stage_count` stages.
    ///
    /// Declining at the final stage still completes the workshop, since no
    /// stage was skipped. Terminal states absorb every event.
    pub fn advance(self, event: StageEvent, stage_count: u32) -> Self {
        let SimulationState::Stage(current) = self else {
            return self;
        };

        match event {
            StageEvent::Continued if current >= stage_count => SimulationState::Completed,
            StageEvent::Continued => SimulationState::Stage(current + 1),
            StageEvent::Declined if current >= stage_count => SimulationState::Completed,
            StageEvent::Declined => SimulationState::DroppedOut(current),
            StageEvent::Failed(message) => SimulationState::Errored {
                stage: current,
                message,
            },
            StageEvent::Cancelled => SimulationState::Interrupted(current - 1),
        }
    }

    /// Outcome for a terminal state, None while still running
    pub fn into_outcome(self) -> Option<SimulationOutcome> {
        match self {
            SimulationState::Stage(_) => None,
            SimulationState::Completed => Some(SimulationOutcome::Completed),
            SimulationState::DroppedOut(stage) => Some(SimulationOutcome::DroppedOut { stage }),
            SimulationState::Errored { stage, message } => {
                Some(SimulationOutcome::Errored { stage, message })
            }
            SimulationState::Interrupted(completed_stages) => {
                Some(SimulationOutcome::Interrupted { completed_stages })
            }
        }
    }
}
