//! Final report types
//!
//! Everything here except `generated_at` is a pure function of the input
//! artifacts, so two reports over the same corpus serialize identically
//! once that field is set aside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::summary::RankedText;
use crate::persona::{DigitalMaturity, PersonaRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    /// Provenance only; not part of the statistics
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over the artifacts that were aggregated, in path order
    pub input_fingerprint: String,
    pub stage_count: usize,
    pub struggling_threshold: f64,
    pub totals: ReportTotals,
    pub stages: Vec<StageAnalysis>,
    pub problematic_stages: Vec<ProblematicStage>,
    pub maturity_cross_tab: Vec<MaturityCrossTab>,
    pub department_segments: Vec<DepartmentSegment>,
    pub skipped_artifacts: Vec<SkippedArtifact>,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub personas: usize,
    pub completed: usize,
    pub dropped_out: usize,
    pub errored: usize,
    pub interrupted: usize,
    pub degraded_results: usize,
    pub average_satisfaction: Option<f64>,
    pub recommendation_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePerceptionCounts {
    pub too_short: usize,
    pub just_right: usize,
    pub too_long: usize,
}

/// Statistics for one stage over the personas that reached it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAnalysis {
    pub stage_number: u32,
    pub stage_name: String,
    pub expected_minutes: f64,
    pub participants: usize,
    /// Personas whose run voluntarily ended at this stage
    pub dropouts: usize,
    pub degraded_results: usize,
    pub average_ease: Option<f64>,
    pub average_clarity: Option<f64>,
    pub average_value: Option<f64>,
    pub average_minutes: Option<f64>,
    pub composite_satisfaction: Option<f64>,
    pub time_perception: TimePerceptionCounts,
    pub pain_points: Vec<PainPointEntry>,
    pub struggling: Vec<StrugglingPersona>,
    pub positive_points: Vec<RankedText>,
    pub suggestions: Vec<RankedText>,
}

/// A distinct pain point and who raised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PainPointEntry {
    pub key: String,
    pub text: String,
    /// Stage results at this stage containing the pain point
    pub count: usize,
    pub personas: Vec<PersonaRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrugglingPersona {
    pub persona: PersonaRef,
    pub composite: f64,
    pub pain_points: Vec<String>,
    pub emotional_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblematicStage {
    pub rank: usize,
    pub stage_number: u32,
    pub stage_name: String,
    pub composite_satisfaction: f64,
    pub participants: usize,
    pub top_pain_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStruggleCount {
    pub stage_number: u32,
    pub stage_name: String,
    pub struggling: usize,
}

/// Where personas of one maturity category struggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaturityCrossTab {
    pub maturity: DigitalMaturity,
    pub personas: usize,
    pub average_satisfaction: Option<f64>,
    pub struggling_stages: Vec<StageStruggleCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSegment {
    pub department: String,
    pub personas: usize,
    pub average_satisfaction: Option<f64>,
    pub top_pain_points: Vec<RankedText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedArtifact {
    pub path: String,
    pub reason: String,
}

/// A group directory that contributed to the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub group_id: String,
    /// Summary file, when the group finished writing one
    pub summary_file: Option<String>,
    pub run_id: Option<String>,
    pub artifacts_loaded: usize,
}
