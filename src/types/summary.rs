//! Group summary type

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{distinct_normalized, mean, PersonaSimulationResult, SimulationOutcome};

/// Number of suggestions kept in a group's top list
pub const TOP_GROUP_SUGGESTIONS: usize = 5;

/// A suggestion with how many stage results raised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedText {
    /// Normalized key used for counting
    pub key: String,
    /// First spelling seen
    pub text: String,
    pub count: usize,
}

/// Rank `(key, text)` occurrences by count descending, then key ascending.
pub fn rank_occurrences<'a>(
    occurrences: impl IntoIterator<Item = (String, &'a str)>,
    limit: Option<usize>,
) -> Vec<RankedText> {
    let mut table: BTreeMap<String, RankedText> = BTreeMap::new();
    for (key, text) in occurrences {
        table
            .entry(key.clone())
            .or_insert_with(|| RankedText {
                key,
                text: text.to_string(),
                count: 0,
            })
            .count += 1;
    }

    let mut ranked: Vec<RankedText> = table.into_values().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    if let Some(n) = limit {
        ranked.truncate(n);
    }
    ranked
}

/// Aggregates of one group run, frozen once the group finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub run_id: String,
    pub group_id: String,
    pub group_name: String,
    pub persona_count: usize,
    pub completed: usize,
    pub dropped_out: usize,
    pub errored: usize,
    pub interrupted: usize,
    /// Personas never started because the run was cancelled
    pub not_started: usize,
    pub degraded_results: usize,
    /// Mean of overall satisfaction over personas with at least one stage
    pub average_satisfaction: Option<f64>,
    pub recommendation_rate: Option<f64>,
    /// Dropout stage number to count
    pub dropout_stages: BTreeMap<u32, usize>,
    pub top_suggestions: Vec<RankedText>,
    /// Artifact file names, relative to the group directory
    pub artifacts: Vec<String>,
    pub results: Vec<PersonaSimulationResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GroupSummary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: impl Into<String>,
        group_id: impl Into<String>,
        group_name: impl Into<String>,
        results: Vec<PersonaSimulationResult>,
        not_started: usize,
        artifacts: Vec<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let count = |pred: fn(&SimulationOutcome) -> bool| {
            results.iter().filter(|r| pred(&r.outcome)).count()
        };
        let completed = count(|o| matches!(o, SimulationOutcome::Completed));
        let dropped_out = count(|o| matches!(o, SimulationOutcome::DroppedOut { .. }));
        let errored = count(|o| matches!(o, SimulationOutcome::Errored { .. }));
        let interrupted = count(|o| matches!(o, SimulationOutcome::Interrupted { .. }));

        let scored: Vec<&PersonaSimulationResult> = results
            .iter()
            .filter(|r| r.overall_satisfaction.is_some())
            .collect();
        let average_satisfaction = mean(scored.iter().filter_map(|r| r.overall_satisfaction));
        let recommendation_rate = mean(
            scored
                .iter()
                .map(|r| if r.would_recommend { 1.0 } else { 0.0 }),
        );

        let mut dropout_stages = BTreeMap::new();
        for stage in results.iter().filter_map(|r| r.dropout_stage) {
            *dropout_stages.entry(stage).or_insert(0) += 1;
        }

        let top_suggestions = rank_occurrences(
            results
                .iter()
                .flat_map(|r| r.stage_results.iter())
                .flat_map(|s| distinct_normalized(&s.suggestions)),
            Some(TOP_GROUP_SUGGESTIONS),
        );

        Self {
            run_id: run_id.into(),
            group_id: group_id.into(),
            group_name: group_name.into(),
            persona_count: results.len() + not_started,
            completed,
            dropped_out,
            errored,
            interrupted,
            not_started,
            degraded_results: results.iter().map(|r| r.degraded_stages as usize).sum(),
            average_satisfaction,
            recommendation_rate,
            dropout_stages,
            top_suggestions,
            artifacts,
            results,
            started_at,
            finished_at,
        }
    }
}
