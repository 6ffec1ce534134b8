//! Group orchestrator - partitions personas and runs each group

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::OrchestratorSettings;
use crate::error::{Error, Result};
use crate::persona::Persona;
use crate::simulator::{CancelFlag, StageSimulator};
use crate::types::{GroupSummary, PersonaSimulationResult, SimulationOutcome};

use super::store::ArtifactStore;

// ─────────────────────────────────────────────────────────────────
// Group Plan
// ─────────────────────────────────────────────────────────────────

/// One group of personas to run together
#[derive(Debug, Clone)]
pub struct GroupPlan {
    pub group_id: String,
    pub group_name: String,
    pub personas: Vec<Persona>,
}

/// Chunk personas into groups of `group_size`, keeping their order.
///
/// The last group holds the remainder.
pub fn partition(personas: &[Persona], group_size: usize) -> Vec<GroupPlan> {
    personas
        .chunks(group_size.max(1))
        .enumerate()
        .map(|(i, chunk)| GroupPlan {
            group_id: format!("group{}", i + 1),
            group_name: format!("Group {}", i + 1),
            personas: chunk.to_vec(),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// Run Summary
// ─────────────────────────────────────────────────────────────────

/// End-of-run totals across every group
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: String,
    pub groups: Vec<GroupSummary>,
    pub completed: usize,
    pub dropped_out: usize,
    pub errored: usize,
    pub interrupted: usize,
    pub not_started: usize,
    pub degraded_results: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn new(run_id: String, groups: Vec<GroupSummary>, skipped_personas: usize, cancelled: bool) -> Self {
        let sum = |f: fn(&GroupSummary) -> usize| groups.iter().map(f).sum::<usize>();
        Self {
            completed: sum(|g| g.completed),
            dropped_out: sum(|g| g.dropped_out),
            errored: sum(|g| g.errored),
            interrupted: sum(|g| g.interrupted),
            not_started: sum(|g| g.not_started) + skipped_personas,
            degraded_results: sum(|g| g.degraded_results),
            run_id,
            groups,
            cancelled,
        }
    }

    pub fn persona_count(&self) -> usize {
        self.completed + self.dropped_out + self.errored + self.interrupted + self.not_started
    }

    /// 130 when interrupted, 2 when any persona errored, else 0
    pub fn exit_code(&self) -> i32 {
        if self.cancelled || self.interrupted > 0 {
            130
        } else if self.errored > 0 {
            2
        } else {
            0
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

/// Runs groups one after another, personas within a group on a bounded pool
pub struct GroupOrchestrator {
    simulator: Arc<StageSimulator>,
    store: ArtifactStore,
    settings: OrchestratorSettings,
    run_id: String,
}

impl GroupOrchestrator {
    pub fn new(simulator: Arc<StageSimulator>, store: ArtifactStore, settings: OrchestratorSettings) -> Self {
        Self {
            simulator,
            store,
            settings,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run every persona, group by group.
    ///
    /// Only artifact write failures abort; persona failures are recorded in
    /// their artifacts.
    pub async fn run(&self, personas: &[Persona], cancel: &CancelFlag) -> Result<RunSummary> {
        let plans = partition(personas, self.settings.group_size);
        info!(
            run_id = %self.run_id,
            personas = personas.len(),
            groups = plans.len(),
            group_size = self.settings.group_size,
            workers = self.settings.max_concurrent_personas,
            "Starting pilot run"
        );

        let mut summaries = Vec::with_capacity(plans.len());
        let mut skipped_personas = 0;
        for plan in &plans {
            if cancel.is_cancelled() {
                warn!(group_id = %plan.group_id, "Run cancelled, skipping group");
                skipped_personas += plan.personas.len();
                continue;
            }
            summaries.push(self.run_group(plan, cancel).await?);
        }

        let summary = RunSummary::new(self.run_id.clone(), summaries, skipped_personas, cancel.is_cancelled());
        info!(
            run_id = %summary.run_id,
            completed = summary.completed,
            dropped_out = summary.dropped_out,
            errored = summary.errored,
            interrupted = summary.interrupted,
            not_started = summary.not_started,
            degraded = summary.degraded_results,
            "Pilot run finished"
        );
        Ok(summary)
    }

    /// Run one group and persist its summary
    pub async fn run_group(&self, plan: &GroupPlan, cancel: &CancelFlag) -> Result<GroupSummary> {
        let started_at = Utc::now();
        let workers = Arc::new(Semaphore::new(self.settings.max_concurrent_personas.max(1)));
        info!(group_id = %plan.group_id, personas = plan.personas.len(), "Starting group");

        let mut handles: Vec<(Persona, JoinHandle<Result<PersonaSimulationResult>>)> = Vec::new();
        let mut not_started = 0;

        for (index, persona) in plan.personas.iter().enumerate() {
            // Waiting here keeps personas starting in registry order
            let permit = workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Internal("worker pool closed".to_string()))?;
            if cancel.is_cancelled() {
                not_started = plan.personas.len() - index;
                warn!(group_id = %plan.group_id, not_started, "Run cancelled, no new personas will start");
                break;
            }

            let simulator = self.simulator.clone();
            let store = self.store.clone();
            let cancel = cancel.clone();
            let run_id = self.run_id.clone();
            let group_id = plan.group_id.clone();
            let task_persona = persona.clone();
            let span = info_span!("persona", group_id = %plan.group_id, persona_id = %persona.id);

            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    let run = simulator.simulate(&task_persona, &cancel).await;
                    let result = PersonaSimulationResult::new(
                        run_id,
                        group_id,
                        task_persona,
                        run.stage_results,
                        run.outcome,
                        run.started_at,
                        run.finished_at,
                    );
                    store.write_result(&result)?;
                    Ok(result)
                }
                .instrument(span),
            );
            handles.push((persona.clone(), handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut artifacts = Vec::with_capacity(handles.len());
        let mut write_failure = None;

        for (persona, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!(group_id = %plan.group_id, persona_id = %persona.id, error = %e, "Failed to persist artifact");
                    write_failure.get_or_insert(e);
                    continue;
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        "persona task panicked".to_string()
                    } else {
                        format!("persona task did not finish: {}", join_error)
                    };
                    let err = Error::PersonaTask {
                        persona_id: persona.id.clone(),
                        message,
                    };
                    error!(group_id = %plan.group_id, persona_id = %persona.id, error = %err, "Persona task failed");
                    let now = Utc::now();
                    let result = PersonaSimulationResult::new(
                        self.run_id.clone(),
                        plan.group_id.clone(),
                        persona,
                        Vec::new(),
                        SimulationOutcome::Errored {
                            stage: 1,
                            message: err.to_string(),
                        },
                        started_at,
                        now,
                    );
                    self.store.write_result(&result)?;
                    result
                }
            };
            artifacts.push(ArtifactStore::result_file_name(&result.persona.id));
            results.push(result);
        }

        if let Some(e) = write_failure {
            return Err(e);
        }

        let summary = GroupSummary::new(
            self.run_id.clone(),
            plan.group_id.clone(),
            plan.group_name.clone(),
            results,
            not_started,
            artifacts,
            started_at,
            Utc::now(),
        );
        let path = self.store.write_group_summary(&summary)?;
        info!(
            group_id = %summary.group_id,
            completed = summary.completed,
            dropped_out = summary.dropped_out,
            errored = summary.errored,
            interrupted = summary.interrupted,
            not_started = summary.not_started,
            path = %path.display(),
            "Group finished"
        );
        Ok(summary)
    }
}
