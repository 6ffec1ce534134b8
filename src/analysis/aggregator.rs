//! Report aggregation
//!
//! Turns a loaded corpus into a `FinalReport`. Everything here is a pure
//! function of the corpus, the catalog and the analysis settings: iteration
//! follows corpus order, tables are keyed by `BTreeMap`, and every sort has
//! a total tie-break.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::AnalysisSettings;
use crate::persona::{DigitalMaturity, Persona, PersonaRef};
use crate::stages::{StageCatalog, StageDescriptor};
use crate::types::{
    distinct_normalized, mean, rank_occurrences, DepartmentSegment, FinalReport, MaturityCrossTab,
    PainPointEntry, PersonaSimulationResult, ProblematicStage, ReportTotals, SimulationOutcome,
    StageAnalysis, StageResult, StageStruggleCount, StrugglingPersona, TimePerception,
    TimePerceptionCounts,
};

use super::loader::LoadedCorpus;

/// Pain points listed per problematic stage and per department
const TOP_PAIN_POINTS: usize = 3;

/// Build the report; `generated_at` is the only input not derived from data
pub fn aggregate(
    corpus: &LoadedCorpus,
    catalog: &StageCatalog,
    settings: &AnalysisSettings,
    generated_at: DateTime<Utc>,
) -> FinalReport {
    let threshold = settings.struggling_threshold;
    let stages: Vec<StageAnalysis> = catalog
        .all()
        .iter()
        .map(|stage| analyze_stage(stage, &corpus.results, threshold))
        .collect();

    FinalReport {
        generated_at,
        input_fingerprint: corpus.fingerprint.clone(),
        stage_count: catalog.len(),
        struggling_threshold: threshold,
        totals: totals(&corpus.results),
        problematic_stages: problematic_stages(&stages, settings.problematic_stage_count),
        maturity_cross_tab: maturity_cross_tab(&corpus.results, &stages),
        department_segments: department_segments(&corpus.results),
        stages,
        skipped_artifacts: corpus.skipped.clone(),
        sources: corpus.sources.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Totals
// ─────────────────────────────────────────────────────────────────

fn totals(results: &[PersonaSimulationResult]) -> ReportTotals {
    let mut totals = ReportTotals {
        personas: results.len(),
        ..Default::default()
    };
    for result in results {
        match result.outcome {
            SimulationOutcome::Completed => totals.completed += 1,
            SimulationOutcome::DroppedOut { .. } => totals.dropped_out += 1,
            SimulationOutcome::Errored { .. } => totals.errored += 1,
            SimulationOutcome::Interrupted { .. } => totals.interrupted += 1,
        }
        totals.degraded_results += result.degraded_stages as usize;
    }

    let scored: Vec<&PersonaSimulationResult> = results
        .iter()
        .filter(|r| r.overall_satisfaction.is_some())
        .collect();
    totals.average_satisfaction = mean(scored.iter().filter_map(|r| r.overall_satisfaction));
    totals.recommendation_rate = mean(scored.iter().map(|r| if r.would_recommend { 1.0 } else { 0.0 }));
    totals
}

// ─────────────────────────────────────────────────────────────────
// Per-Stage Analysis
// ─────────────────────────────────────────────────────────────────

fn analyze_stage(stage: &StageDescriptor, results: &[PersonaSimulationResult], threshold: f64) -> StageAnalysis {
    // Results that reached this stage; dropouts before it are excluded
    let entries: Vec<(&Persona, &StageResult)> = results
        .iter()
        .filter_map(|r| r.stage(stage.number).map(|s| (&r.persona, s)))
        .collect();

    let mut time_perception = TimePerceptionCounts::default();
    for (_, result) in &entries {
        match result.time_perception {
            TimePerception::TooShort => time_perception.too_short += 1,
            TimePerception::JustRight => time_perception.just_right += 1,
            TimePerception::TooLong => time_perception.too_long += 1,
        }
    }

    let mut pain_table: BTreeMap<String, PainPointEntry> = BTreeMap::new();
    for (persona, result) in &entries {
        for (key, text) in result.distinct_pain_points() {
            let entry = pain_table.entry(key.clone()).or_insert_with(|| PainPointEntry {
                key,
                text: text.to_string(),
                count: 0,
                personas: Vec::new(),
            });
            entry.count += 1;
            entry.personas.push(PersonaRef::from(*persona));
        }
    }
    let mut pain_points: Vec<PainPointEntry> = pain_table.into_values().collect();
    for entry in &mut pain_points {
        entry.personas.sort();
    }
    pain_points.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));

    let mut struggling: Vec<StrugglingPersona> = entries
        .iter()
        .filter(|(_, r)| r.composite() < threshold)
        .map(|(persona, r)| StrugglingPersona {
            persona: PersonaRef::from(*persona),
            composite: r.composite(),
            pain_points: r.distinct_pain_points().into_iter().map(|(_, t)| t.to_string()).collect(),
            emotional_state: r.emotional_state.clone(),
        })
        .collect();
    struggling.sort_by(|a, b| {
        a.composite
            .total_cmp(&b.composite)
            .then_with(|| a.persona.id.cmp(&b.persona.id))
    });

    StageAnalysis {
        stage_number: stage.number,
        stage_name: stage.name.clone(),
        expected_minutes: stage.expected_minutes,
        participants: entries.len(),
        dropouts: results
            .iter()
            .filter(|r| r.dropout_stage == Some(stage.number))
            .count(),
        degraded_results: entries.iter().filter(|(_, r)| r.degraded).count(),
        average_ease: mean(entries.iter().map(|(_, r)| r.ease_of_use as f64)),
        average_clarity: mean(entries.iter().map(|(_, r)| r.clarity as f64)),
        average_value: mean(entries.iter().map(|(_, r)| r.value as f64)),
        average_minutes: mean(entries.iter().map(|(_, r)| r.actual_minutes)),
        composite_satisfaction: mean(entries.iter().map(|(_, r)| r.composite())),
        time_perception,
        pain_points,
        struggling,
        positive_points: rank_occurrences(
            entries.iter().flat_map(|(_, r)| distinct_normalized(&r.positive_points)),
            None,
        ),
        suggestions: rank_occurrences(
            entries.iter().flat_map(|(_, r)| distinct_normalized(&r.suggestions)),
            None,
        ),
    }
}

// ─────────────────────────────────────────────────────────────────
// Cross-Cutting Analysis
// ─────────────────────────────────────────────────────────────────

/// Lowest composite first, ties by stage number; stages nobody reached are left out
fn problematic_stages(stages: &[StageAnalysis], limit: usize) -> Vec<ProblematicStage> {
    let mut ranked: Vec<(&StageAnalysis, f64)> = stages
        .iter()
        .filter_map(|s| s.composite_satisfaction.map(|c| (s, c)))
        .collect();
    ranked.sort_by(|(a, ca), (b, cb)| ca.total_cmp(cb).then_with(|| a.stage_number.cmp(&b.stage_number)));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (stage, composite))| ProblematicStage {
            rank: i + 1,
            stage_number: stage.stage_number,
            stage_name: stage.stage_name.clone(),
            composite_satisfaction: composite,
            participants: stage.participants,
            top_pain_points: stage
                .pain_points
                .iter()
                .take(TOP_PAIN_POINTS)
                .map(|p| p.text.clone())
                .collect(),
        })
        .collect()
}

fn maturity_cross_tab(results: &[PersonaSimulationResult], stages: &[StageAnalysis]) -> Vec<MaturityCrossTab> {
    DigitalMaturity::all()
        .iter()
        .map(|maturity| {
            let members: Vec<&PersonaSimulationResult> = results
                .iter()
                .filter(|r| r.persona.digital_maturity == *maturity)
                .collect();

            let mut struggling_stages: Vec<StageStruggleCount> = stages
                .iter()
                .map(|s| StageStruggleCount {
                    stage_number: s.stage_number,
                    stage_name: s.stage_name.clone(),
                    struggling: s
                        .struggling
                        .iter()
                        .filter(|p| p.persona.digital_maturity == *maturity)
                        .count(),
                })
                .filter(|c| c.struggling > 0)
                .collect();
            struggling_stages.sort_by(|a, b| {
                b.struggling
                    .cmp(&a.struggling)
                    .then_with(|| a.stage_number.cmp(&b.stage_number))
            });

            MaturityCrossTab {
                maturity: *maturity,
                personas: members.len(),
                average_satisfaction: mean(members.iter().filter_map(|r| r.overall_satisfaction)),
                struggling_stages,
            }
        })
        .collect()
}

/// Least satisfied departments first; departments without scores go last
fn department_segments(results: &[PersonaSimulationResult]) -> Vec<DepartmentSegment> {
    let mut by_department: BTreeMap<&str, Vec<&PersonaSimulationResult>> = BTreeMap::new();
    for result in results {
        by_department
            .entry(result.persona.department.as_str())
            .or_default()
            .push(result);
    }

    let mut segments: Vec<DepartmentSegment> = by_department
        .into_iter()
        .map(|(department, members)| DepartmentSegment {
            department: department.to_string(),
            personas: members.len(),
            average_satisfaction: mean(members.iter().filter_map(|r| r.overall_satisfaction)),
            top_pain_points: rank_occurrences(
                members
                    .iter()
                    .flat_map(|r| r.stage_results.iter())
                    .flat_map(|s| s.distinct_pain_points()),
                Some(TOP_PAIN_POINTS),
            ),
        })
        .collect();

    segments.sort_by(|a, b| {
        let order = match (a.average_satisfaction, b.average_satisfaction) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        order.then_with(|| a.department.cmp(&b.department))
    });
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::persona::PersonaRegistry;

    fn stage_result(n: u32, scores: (u8, u8, u8), cont: bool, pains: &[&str]) -> StageResult {
        StageResult {
            stage_number: n,
            stage_name: format!("Stage {}", n),
            actual_minutes: n as f64,
            time_perception: TimePerception::JustRight,
            ease_of_use: scores.0,
            clarity: scores.1,
            value: scores.2,
            pain_points: pains.iter().map(|p| p.to_string()).collect(),
            positive_points: vec!["Clear".into()],
            suggestions: vec!["More examples".into()],
            would_continue: cont,
            emotional_state: "calm".into(),
            degraded: false,
            fallback_reason: None,
            attempts: 1,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn artifact(persona: &str, stages: Vec<StageResult>, outcome: SimulationOutcome) -> PersonaSimulationResult {
        let persona = PersonaRegistry::bundled().unwrap().get(persona).unwrap().clone();
        PersonaSimulationResult::new("run", "group1", persona, stages, outcome, at(), at())
    }

    fn full_run(persona: &str, scores: (u8, u8, u8)) -> PersonaSimulationResult {
        let stages = (1..=11).map(|n| stage_result(n, scores, true, &[])).collect();
        artifact(persona, stages, SimulationOutcome::Completed)
    }

    fn corpus(results: Vec<PersonaSimulationResult>) -> LoadedCorpus {
        LoadedCorpus {
            results,
            fingerprint: "f".repeat(64),
            ..Default::default()
        }
    }

    fn report(results: Vec<PersonaSimulationResult>) -> FinalReport {
        let catalog = StageCatalog::bundled().unwrap();
        aggregate(&corpus(results), &catalog, &AnalysisSettings::default(), at())
    }

    #[test]
    fn test_dropout_excluded_from_later_stages() {
        let mut dropped: Vec<StageResult> = (1..=3).map(|n| stage_result(n, (2, 2, 2), true, &[])).collect();
        dropped.push(stage_result(4, (2, 2, 2), false, &["Lost"]));
        let results = vec![
            full_run("P001", (8, 8, 8)),
            full_run("P002", (8, 8, 8)),
            artifact("P003", dropped, SimulationOutcome::DroppedOut { stage: 4 }),
            full_run("P004", (8, 8, 8)),
            full_run("P005", (8, 8, 8)),
        ];
        let report = report(results);

        assert_eq!(report.totals.personas, 5);
        assert_eq!(report.totals.dropped_out, 1);
        assert_eq!(report.stages[3].participants, 5);
        assert_eq!(report.stages[3].dropouts, 1);
        for stage in &report.stages[4..] {
            assert_eq!(stage.participants, 4);
            assert!(stage.struggling.iter().all(|p| p.persona.id != "P003"));
            assert!((stage.composite_satisfaction.unwrap() - 8.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stage_means() {
        let results = vec![full_run("P001", (6, 7, 8)), full_run("P002", (9, 9, 9))];
        let stage = &report(results).stages[0];
        assert!((stage.average_ease.unwrap() - 7.5).abs() < 1e-6);
        assert!((stage.average_clarity.unwrap() - 8.0).abs() < 1e-6);
        assert!((stage.average_value.unwrap() - 8.5).abs() < 1e-6);
        assert!((stage.composite_satisfaction.unwrap() - 8.0).abs() < 1e-6);
        assert_eq!(stage.time_perception.just_right, 2);
    }

    #[test]
    fn test_pain_point_counts_by_result() {
        let a = artifact(
            "P001",
            vec![stage_result(1, (5, 5, 5), true, &["Too slow", "too   SLOW ", "Confusing"])],
            SimulationOutcome::Interrupted { completed_stages: 1 },
        );
        let b = artifact(
            "P002",
            vec![stage_result(1, (9, 9, 9), true, &["Too Slow"])],
            SimulationOutcome::Interrupted { completed_stages: 1 },
        );
        let stage = &report(vec![a, b]).stages[0];

        assert_eq!(stage.pain_points.len(), 2);
        assert_eq!(stage.pain_points[0].key, "too slow");
        assert_eq!(stage.pain_points[0].text, "Too slow");
        assert_eq!(stage.pain_points[0].count, 2);
        assert_eq!(stage.pain_points[0].personas.len(), 2);
        assert_eq!(stage.pain_points[1].count, 1);

        // Only P001 is under the threshold
        assert_eq!(stage.struggling.len(), 1);
        assert_eq!(stage.struggling[0].persona.id, "P001");
        assert_eq!(stage.struggling[0].pain_points, vec!["Too slow", "Confusing"]);
    }

    #[test]
    fn test_problematic_ranking_breaks_ties_by_stage() {
        let stages = (1..=11)
            .map(|n| {
                let score = match n {
                    5 | 2 => 4,
                    9 => 5,
                    _ => 9,
                };
                stage_result(n, (score, score, score), true, &[])
            })
            .collect();
        let report = report(vec![artifact("P001", stages, SimulationOutcome::Completed)]);

        let order: Vec<u32> = report.problematic_stages.iter().map(|p| p.stage_number).collect();
        assert_eq!(order, vec![2, 5, 9]);
        assert_eq!(report.problematic_stages[0].rank, 1);
    }

    #[test]
    fn test_maturity_cross_tab_covers_every_category() {
        let registry = PersonaRegistry::bundled().unwrap();
        let beginner = registry
            .all()
            .iter()
            .find(|p| p.digital_maturity == DigitalMaturity::Beginner)
            .unwrap()
            .id
            .clone();
        let report = report(vec![full_run(&beginner, (5, 5, 5)), full_run("P001", (9, 9, 9))]);

        assert_eq!(report.maturity_cross_tab.len(), 4);
        let row = report
            .maturity_cross_tab
            .iter()
            .find(|c| c.maturity == DigitalMaturity::Beginner)
            .unwrap();
        assert_eq!(row.personas, 1);
        assert_eq!(row.struggling_stages.len(), 11);
        assert_eq!(row.struggling_stages[0].stage_number, 1);
    }

    #[test]
    fn test_department_segments_sorted_by_satisfaction() {
        let report = report(vec![full_run("P001", (9, 9, 9)), full_run("P002", (4, 4, 4))]);
        let segments = &report.department_segments;
        assert!(!segments.is_empty());
        for pair in segments.windows(2) {
            assert!(pair[0].average_satisfaction <= pair[1].average_satisfaction);
        }
    }

    #[test]
    fn test_report_is_deterministic() {
        let build = || {
            report(vec![
                full_run("P001", (6, 7, 8)),
                full_run("P002", (9, 4, 7)),
                full_run("P003", (5, 5, 5)),
            ])
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }
}
