//! Stage and persona result types
//!
//! These are the records persisted as per-persona artifacts and read back
//! by the aggregator, so field names follow the advisory reply contract
//! (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::Persona;
use crate::stages::StageDescriptor;

/// Score substituted for all three ratings in a degraded result
pub const NEUTRAL_SCORE: u8 = 7;

/// Emotional state recorded in a degraded result
pub const NEUTRAL_EMOTION: &str = "neutral";

/// Overall satisfaction at or above which a persona would recommend the workshop
pub const RECOMMEND_THRESHOLD: f64 = 7.0;

/// Number of distinct suggestions kept as a persona's top improvements
pub const TOP_IMPROVEMENTS: usize = 5;

// ─────────────────────────────────────────────────────────────────
// Time Perception
// ─────────────────────────────────────────────────────────────────

/// How a persona felt about the time a stage took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePerception {
    TooShort,
    JustRight,
    TooLong,
}

impl TimePerception {
    /// Parse the spellings advisory replies use in practice:
    /// "TooShort", "Too Short", "too_short", "too-short".
    pub fn parse_loose(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "tooshort" => Some(TimePerception::TooShort),
            "justright" => Some(TimePerception::JustRight),
            "toolong" => Some(TimePerception::TooLong),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimePerception::TooShort => "Too Short",
            TimePerception::JustRight => "Just Right",
            TimePerception::TooLong => "Too Long",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Stage Result
// ─────────────────────────────────────────────────────────────────

/// Feedback of one persona on one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage_number: u32,
    pub stage_name: String,
    pub actual_minutes: f64,
    pub time_perception: TimePerception,
    pub ease_of_use: u8,
    pub clarity: u8,
    pub value: u8,
    pub pain_points: Vec<String>,
    pub positive_points: Vec<String>,
    pub suggestions: Vec<String>,
    pub would_continue: bool,
    pub emotional_state: String,

    /// True when the advisory service never produced a usable reply and
    /// neutral values were substituted
    #[serde(default)]
    pub degraded: bool,

    /// Last failure seen before degrading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,

    /// Advisory attempts spent on this stage
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl StageResult {
    /// Neutral stand-in used once retries are exhausted
    pub fn degraded(stage: &StageDescriptor, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            stage_number: stage.number,
            stage_name: stage.name.clone(),
            actual_minutes: stage.expected_minutes,
            time_perception: TimePerception::JustRight,
            ease_of_use: NEUTRAL_SCORE,
            clarity: NEUTRAL_SCORE,
            value: NEUTRAL_SCORE,
            pain_points: vec![],
            positive_points: vec![],
            suggestions: vec![],
            would_continue: true,
            emotional_state: NEUTRAL_EMOTION.to_string(),
            degraded: true,
            fallback_reason: Some(reason.into()),
            attempts,
        }
    }

    /// Mean of ease, clarity and value
    pub fn composite(&self) -> f64 {
        (self.ease_of_use as f64 + self.clarity as f64 + self.value as f64) / 3.0
    }

    /// Pain points of this result, normalized and deduplicated, in order
    pub fn distinct_pain_points(&self) -> Vec<(String, &str)> {
        distinct_normalized(&self.pain_points)
    }
}

/// Normalize free-text feedback for counting: trim, collapse internal
/// whitespace, lowercase.
pub fn normalize_feedback(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Distinct `(normalized key, original text)` pairs, first spelling wins.
/// Blank entries are dropped.
pub fn distinct_normalized(items: &[String]) -> Vec<(String, &str)> {
    let mut seen: Vec<(String, &str)> = Vec::with_capacity(items.len());
    for item in items {
        let key = normalize_feedback(item);
        if key.is_empty() || seen.iter().any(|(k, _)| *k == key) {
            continue;
        }
        seen.push((key, item.trim()));
    }
    seen
}

// ─────────────────────────────────────────────────────────────────
// Persona Simulation Result
// ─────────────────────────────────────────────────────────────────

/// How a persona's run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SimulationOutcome {
    /// Every stage was attempted
    Completed,
    /// Voluntary early exit: the persona declined to continue after `stage`
    DroppedOut { stage: u32 },
    /// An unexpected failure stopped the run at `stage`
    Errored { stage: u32, message: String },
    /// The run was cancelled after `completed_stages` stages
    Interrupted {
        #[serde(rename = "completedStages")]
        completed_stages: u32,
    },
}

impl SimulationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SimulationOutcome::Completed => "completed",
            SimulationOutcome::DroppedOut { .. } => "dropped out",
            SimulationOutcome::Errored { .. } => "errored",
            SimulationOutcome::Interrupted { .. } => "interrupted",
        }
    }
}

/// Error record kept in an errored persona's artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSimulationError {
    pub stage: u32,
    pub message: String,
}

/// Everything recorded for one persona's run: the per-persona artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSimulationResult {
    pub run_id: String,
    pub group_id: String,
    pub persona: Persona,
    pub stage_results: Vec<StageResult>,
    pub outcome: SimulationOutcome,
    pub dropout: bool,
    pub dropout_stage: Option<u32>,
    pub error: Option<PersonaSimulationError>,

    /// Mean over stages of the per-stage composite; None without stages
    pub overall_satisfaction: Option<f64>,
    pub total_minutes: f64,
    pub degraded_stages: u32,
    pub would_recommend: bool,
    pub top_improvements: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PersonaSimulationResult {
    /// Assemble an artifact, deriving every summary field from the results
    pub fn new(
        run_id: impl Into<String>,
        group_id: impl Into<String>,
        persona: Persona,
        stage_results: Vec<StageResult>,
        outcome: SimulationOutcome,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let overall_satisfaction = mean(stage_results.iter().map(StageResult::composite));
        let total_minutes = stage_results.iter().map(|r| r.actual_minutes).sum();
        let degraded_stages = stage_results.iter().filter(|r| r.degraded).count() as u32;

        let mut top_improvements: Vec<String> = Vec::new();
        let mut seen_keys: Vec<String> = Vec::new();
        for suggestion in stage_results.iter().flat_map(|r| r.suggestions.iter()) {
            let key = normalize_feedback(suggestion);
            if key.is_empty() || seen_keys.contains(&key) {
                continue;
            }
            seen_keys.push(key);
            top_improvements.push(suggestion.trim().to_string());
            if top_improvements.len() == TOP_IMPROVEMENTS {
                break;
            }
        }

        let (dropout, dropout_stage) = match outcome {
            SimulationOutcome::DroppedOut { stage } => (true, Some(stage)),
            _ => (false, None),
        };
        let error = match &outcome {
            SimulationOutcome::Errored { stage, message } => Some(PersonaSimulationError {
                stage: *stage,
                message: message.clone(),
            }),
            _ => None,
        };

        Self {
            run_id: run_id.into(),
            group_id: group_id.into(),
            persona,
            stage_results,
            outcome,
            dropout,
            dropout_stage,
            error,
            would_recommend: overall_satisfaction.is_some_and(|s| s >= RECOMMEND_THRESHOLD),
            overall_satisfaction,
            total_minutes,
            degraded_stages,
            top_improvements,
            started_at,
            finished_at,
        }
    }

    /// Result for stage `number`, if the persona reached it
    pub fn stage(&self, number: u32) -> Option<&StageResult> {
        number
            .checked_sub(1)
            .and_then(|i| self.stage_results.get(i as usize))
    }

    /// Check the artifact invariants against a catalog of `stage_count` stages.
    pub fn check_invariants(&self, stage_count: usize) -> std::result::Result<(), String> {
        if self.stage_results.len() > stage_count {
            return Err(format!(
                "{} stage results but the catalog has {} stages",
                self.stage_results.len(),
                stage_count
            ));
        }

        for (index, result) in self.stage_results.iter().enumerate() {
            let expected = index as u32 + 1;
            if result.stage_number != expected {
                return Err(format!(
                    "stage results not contiguous: position {} holds stage {}",
                    expected, result.stage_number
                ));
            }
            for (name, score) in [
                ("easeOfUse", result.ease_of_use),
                ("clarity", result.clarity),
                ("value", result.value),
            ] {
                if !(1..=10).contains(&score) {
                    return Err(format!("stage {} {} out of range: {}", expected, name, score));
                }
            }
            let is_last = index + 1 == self.stage_results.len();
            if !result.would_continue && !is_last {
                return Err(format!("results continue past a dropout at stage {}", expected));
            }
        }

        let ends_declined = self
            .stage_results
            .last()
            .is_some_and(|r| !r.would_continue);
        let should_drop = ends_declined && self.stage_results.len() < stage_count;
        if self.dropout != should_drop {
            return Err(format!(
                "dropout flag is {} but the results imply {}",
                self.dropout, should_drop
            ));
        }
        if self.dropout && self.dropout_stage != Some(self.stage_results.len() as u32) {
            return Err("dropout stage does not match the last stage result".to_string());
        }

        Ok(())
    }
}

/// Arithmetic mean, None for an empty input
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::DigitalMaturity;

    fn persona() -> Persona {
        Persona {
            id: "P1".into(),
            name: "Kim".into(),
            department: "Sales".into(),
            company: None,
            category: None,
            team_size: 5,
            digital_maturity: DigitalMaturity::Intermediate,
            age: None,
            experience_years: None,
        }
    }

    fn result(stage: u32, scores: (u8, u8, u8), cont: bool) -> StageResult {
        StageResult {
            stage_number: stage,
            stage_name: format!("S{}", stage),
            actual_minutes: 5.0,
            time_perception: TimePerception::JustRight,
            ease_of_use: scores.0,
            clarity: scores.1,
            value: scores.2,
            pain_points: vec![],
            positive_points: vec![],
            suggestions: vec![format!("Idea {}", stage), "idea 1".into()],
            would_continue: cont,
            emotional_state: "calm".into(),
            degraded: false,
            fallback_reason: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_time_perception_parse_loose() {
        assert_eq!(TimePerception::parse_loose("TooShort"), Some(TimePerception::TooShort));
        assert_eq!(TimePerception::parse_loose("Just Right"), Some(TimePerception::JustRight));
        assert_eq!(TimePerception::parse_loose("too_long"), Some(TimePerception::TooLong));
        assert_eq!(TimePerception::parse_loose("forever"), None);
    }

    #[test]
    fn test_normalize_feedback() {
        assert_eq!(normalize_feedback("  Too   MANY\tclicks "), "too many clicks");
        let items = vec!["Slow UI".to_string(), "slow  ui".to_string(), " ".to_string()];
        let distinct = distinct_normalized(&items);
        assert_eq!(distinct, vec![("slow ui".to_string(), "Slow UI")]);
    }

    #[test]
    fn test_degraded_result() {
        let stage = StageDescriptor {
            number: 3,
            name: "Check".into(),
            description: String::new(),
            expected_minutes: 7.0,
        };
        let r = StageResult::degraded(&stage, "timeout", 3);
        assert!(r.degraded);
        assert_eq!(r.actual_minutes, 7.0);
        assert_eq!((r.ease_of_use, r.clarity, r.value), (7, 7, 7));
        assert!(r.would_continue);
        assert_eq!(r.emotional_state, "neutral");
        assert_eq!(r.composite(), 7.0);
    }

    #[test]
    fn test_overall_satisfaction_is_mean_of_composites() {
        let results = vec![result(1, (9, 8, 7), true), result(2, (4, 5, 6), true)];
        let now = Utc::now();
        let r = PersonaSimulationResult::new("run", "group1", persona(), results, SimulationOutcome::Completed, now, now);

        let expected = ((9.0 + 8.0 + 7.0) / 3.0 + (4.0 + 5.0 + 6.0) / 3.0) / 2.0;
        assert!((r.overall_satisfaction.unwrap() - expected).abs() < 1e-6);
        assert!(r.would_recommend == (expected >= 7.0));
        assert_eq!(r.top_improvements, vec!["Idea 1", "Idea 2"]);
        assert_eq!(r.total_minutes, 10.0);
    }

    #[test]
    fn test_dropout_fields() {
        let results = vec![result(1, (8, 8, 8), true), result(2, (3, 3, 3), false)];
        let now = Utc::now();
        let r = PersonaSimulationResult::new(
            "run",
            "group1",
            persona(),
            results,
            SimulationOutcome::DroppedOut { stage: 2 },
            now,
            now,
        );
        assert!(r.dropout);
        assert_eq!(r.dropout_stage, Some(2));
        assert!(r.check_invariants(11).is_ok());
        // The same artifact claims a dropout it cannot have against a 2-stage catalog
        assert!(r.check_invariants(2).is_err());
    }

    #[test]
    fn test_invariants_reject_gaps() {
        let results = vec![result(1, (8, 8, 8), true), result(3, (8, 8, 8), true)];
        let now = Utc::now();
        let r = PersonaSimulationResult::new("run", "g", persona(), results, SimulationOutcome::Completed, now, now);
        assert!(r.check_invariants(11).unwrap_err().contains("contiguous"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(SimulationOutcome::Interrupted { completed_stages: 2 }).unwrap();
        assert_eq!(json["status"], "interrupted");
        assert_eq!(json["completedStages"], 2);

        let json = serde_json::to_value(SimulationOutcome::DroppedOut { stage: 4 }).unwrap();
        assert_eq!(json["status"], "droppedOut");
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean(vec![1.0, 2.0, 6.0]), Some(3.0));
    }
}
