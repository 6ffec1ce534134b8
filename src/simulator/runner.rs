//! Stage simulator - drives one persona through the stage catalog

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tracing::{debug, error, info};

use crate::advisory::AdvisoryClient;
use crate::config::SimulationSettings;
use crate::error::Error;
use crate::persona::Persona;
use crate::stages::StageCatalog;
use crate::types::{SimulationOutcome, StageResult};

use super::digest::ContextDigest;
use super::state::{SimulationState, StageEvent};
use super::CancelFlag;

/// Raw output of one persona's run, before it becomes an artifact
#[derive(Debug, Clone)]
pub struct PersonaRun {
    pub stage_results: Vec<StageResult>,
    pub outcome: SimulationOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs personas through the workshop, one stage at a time
pub struct StageSimulator {
    client: Arc<AdvisoryClient>,
    catalog: Arc<StageCatalog>,
    settings: SimulationSettings,
}

impl StageSimulator {
    pub fn new(client: Arc<AdvisoryClient>, catalog: Arc<StageCatalog>, settings: SimulationSettings) -> Self {
        Self {
            client,
            catalog,
            settings,
        }
    }

    /// Simulate `persona` until it completes, drops out, errors, or the
    /// cancel flag is seen between stages.
    ///
    /// Stages are strictly sequential: each prompt carries a digest of the
    /// stages before it.
    pub async fn simulate(&self, persona: &Persona, cancel: &CancelFlag) -> PersonaRun {
        let started_at = Utc::now();
        let stage_count = self.catalog.last_number();
        let mut digest = ContextDigest::new(
            self.settings.digest_max_stages,
            self.settings.digest_pain_point_chars,
        );
        let mut stage_results: Vec<StageResult> = Vec::with_capacity(self.catalog.len());
        let mut state = SimulationState::initial();
        info!(persona_id = %persona.id, backend = self.client.backend_name(), stages = stage_count, "Starting persona simulation");

        while let SimulationState::Stage(number) = state {
            if cancel.is_cancelled() {
                info!(persona_id = %persona.id, stage = number, "Cancellation requested, stopping persona");
                state = state.advance(StageEvent::Cancelled, stage_count);
                continue;
            }

            let Some(stage) = self.catalog.get(number) else {
                state = state.advance(StageEvent::Failed(format!("stage {} missing from catalog", number)), stage_count);
                continue;
            };

            debug!(persona_id = %persona.id, stage = number, name = %stage.name, "Evaluating stage");

            // A panic ends this persona at this stage; earlier results stay
            let evaluation = AssertUnwindSafe(self.client.evaluate_stage(persona, stage, &digest.render()))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::Internal(format!(
                        "advisory evaluation panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });

            let event = match evaluation {
                Ok(result) => {
                    let event = if result.would_continue {
                        StageEvent::Continued
                    } else {
                        StageEvent::Declined
                    };
                    digest.push(&result);
                    stage_results.push(result);
                    event
                }
                Err(e) => {
                    error!(persona_id = %persona.id, stage = number, error = %e.format_for_log(), "Stage evaluation failed");
                    let failure = Error::PersonaSimulation {
                        persona_id: persona.id.clone(),
                        stage: number,
                        message: e.to_string(),
                    };
                    StageEvent::Failed(failure.to_string())
                }
            };
            state = state.advance(event, stage_count);
        }

        debug_assert!(state.is_terminal());
        let outcome = state.into_outcome().unwrap_or(SimulationOutcome::Errored {
            stage: stage_results.len() as u32 + 1,
            message: "simulation stopped before reaching a terminal state".to_string(),
        });

        info!(
            persona_id = %persona.id,
            outcome = outcome.label(),
            stages = stage_results.len(),
            degraded = stage_results.iter().filter(|r| r.degraded).count(),
            "Persona simulation finished"
        );

        PersonaRun {
            stage_results,
            outcome,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
