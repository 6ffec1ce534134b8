//! Artifact discovery and loading
//!
//! Expected artifacts for a group are the ones its summary lists plus every
//! `*_result.json` present. Anything missing, unreadable or inconsistent is
//! skipped with a warning and recorded in the report.
//!
//! A rerun into the same directory leaves older artifacts behind. Inside a
//! group with a summary, only artifacts carrying the summary's run id count.
//! Across groups each persona counts once: the artifact that finished last
//! wins, ties going to the first in path order.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::orchestrator::store::{ArtifactStore, GroupListing, GROUP_SUMMARY_FILE};
use crate::types::{PersonaSimulationResult, SkippedArtifact, SourceRef};

/// The part of a group summary the loader cares about
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryListing {
    run_id: String,
    #[serde(default)]
    artifacts: Vec<String>,
}

/// Everything read from a results directory
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    /// Accepted artifacts, in path order
    pub results: Vec<PersonaSimulationResult>,
    pub skipped: Vec<SkippedArtifact>,
    pub sources: Vec<SourceRef>,
    /// Hex SHA-256 over the relative path and bytes of each accepted artifact
    pub fingerprint: String,
}

/// Load every artifact under the store root, validating against a catalog
/// of `stage_count` stages.
pub fn load_corpus(store: &ArtifactStore, stage_count: usize) -> Result<LoadedCorpus> {
    let listings = store.discover()?;
    let mut corpus = LoadedCorpus::default();
    let mut candidates = Vec::new();

    for listing in &listings {
        load_group(listing, stage_count, &mut corpus, &mut candidates);
    }

    let mut hasher = Sha256::new();
    let mut loaded_per_group: HashMap<String, usize> = HashMap::new();
    for candidate in drop_superseded(candidates, &mut corpus) {
        hasher.update(candidate.relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(&candidate.bytes);
        hasher.update([0u8]);
        *loaded_per_group.entry(candidate.group_id).or_default() += 1;
        corpus.results.push(candidate.result);
    }
    for source in &mut corpus.sources {
        source.artifacts_loaded = loaded_per_group.get(&source.group_id).copied().unwrap_or(0);
    }
    corpus.sources.retain(|s| s.artifacts_loaded > 0 || s.summary_file.is_some());

    if corpus.results.is_empty() {
        return Err(Error::NoArtifacts {
            path: store.root().to_path_buf(),
        });
    }

    corpus.fingerprint = hex::encode(hasher.finalize());
    debug!(
        loaded = corpus.results.len(),
        skipped = corpus.skipped.len(),
        fingerprint = %corpus.fingerprint,
        "Artifacts loaded"
    );
    Ok(corpus)
}

/// An artifact that passed validation but may still lose to a newer copy
struct Candidate {
    group_id: String,
    relative: String,
    result: PersonaSimulationResult,
    bytes: Vec<u8>,
}

fn load_group(
    listing: &GroupListing,
    stage_count: usize,
    corpus: &mut LoadedCorpus,
    candidates: &mut Vec<Candidate>,
) {
    let mut expected: BTreeSet<String> = listing
        .result_files
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();

    let mut run_id = None;
    let mut summary_file = None;
    if let Some(ref summary_path) = listing.summary_path {
        let relative = relative_name(&listing.group_id, GROUP_SUMMARY_FILE);
        match read_summary(summary_path) {
            Ok(summary) => {
                run_id = Some(summary.run_id);
                expected.extend(summary.artifacts);
                summary_file = Some(relative);
            }
            Err(e) => skip(corpus, relative, e),
        }
    }

    for name in expected {
        let relative = relative_name(&listing.group_id, &name);
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            skip(
                corpus,
                relative,
                Error::aggregation_input(&name, "artifact name must be a plain file name"),
            );
            continue;
        }

        let path = listing.dir.join(&name);
        match read_artifact(&path, stage_count) {
            Ok((result, _)) if run_id.as_deref().is_some_and(|id| id != result.run_id) => {
                let reason = format!(
                    "stale artifact from run {} (group summary is run {})",
                    result.run_id,
                    run_id.as_deref().unwrap_or_default()
                );
                skip(corpus, relative, Error::aggregation_input(&path, reason));
            }
            Ok((result, bytes)) => candidates.push(Candidate {
                group_id: listing.group_id.clone(),
                relative,
                result,
                bytes,
            }),
            Err(e) => skip(corpus, relative, e),
        }
    }

    corpus.sources.push(SourceRef {
        group_id: listing.group_id.clone(),
        summary_file,
        run_id,
        artifacts_loaded: 0,
    });
}

/// Keep one artifact per persona id, preserving path order
fn drop_superseded(candidates: Vec<Candidate>, corpus: &mut LoadedCorpus) -> Vec<Candidate> {
    let mut winners: HashMap<String, usize> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let newer = match winners.get(&candidate.result.persona.id) {
            Some(&best) => candidate.result.finished_at > candidates[best].result.finished_at,
            None => true,
        };
        if newer {
            winners.insert(candidate.result.persona.id.clone(), index);
        }
    }
    let winner_paths: HashMap<String, String> = winners
        .iter()
        .map(|(id, &index)| (id.clone(), candidates[index].relative.clone()))
        .collect();

    let mut accepted = Vec::with_capacity(winners.len());
    for (index, candidate) in candidates.into_iter().enumerate() {
        let id = &candidate.result.persona.id;
        if winners.get(id) == Some(&index) {
            accepted.push(candidate);
            continue;
        }
        let reason = format!("duplicate of persona {}, superseded by {}", id, winner_paths[id]);
        let error = Error::aggregation_input(&candidate.relative, reason);
        skip(corpus, candidate.relative, error);
    }
    accepted
}

fn read_summary(path: &Path) -> Result<SummaryListing> {
    let bytes = fs::read(path).map_err(|e| Error::aggregation_input(path, format!("unreadable: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::aggregation_input(path, format!("invalid group summary: {}", e)))
}

fn read_artifact(path: &Path, stage_count: usize) -> Result<(PersonaSimulationResult, Vec<u8>)> {
    let bytes = fs::read(path).map_err(|e| {
        let reason = if e.kind() == std::io::ErrorKind::NotFound {
            "listed in group summary but missing".to_string()
        } else {
            format!("unreadable: {}", e)
        };
        Error::aggregation_input(path, reason)
    })?;
    let result: PersonaSimulationResult = serde_json::from_slice(&bytes)
        .map_err(|e| Error::aggregation_input(path, format!("invalid artifact: {}", e)))?;
    result
        .check_invariants(stage_count)
        .map_err(|reason| Error::aggregation_input(path, reason))?;
    Ok((result, bytes))
}

fn skip(corpus: &mut LoadedCorpus, relative: String, error: Error) {
    let reason = match error {
        Error::AggregationInput { reason, .. } => reason,
        other => other.to_string(),
    };
    warn!(path = %relative, reason = %reason, "Skipping artifact");
    corpus.skipped.push(SkippedArtifact { path: relative, reason });
}

/// Paths in the report use `/` regardless of platform
fn relative_name(group_id: &str, file: &str) -> String {
    format!("{}/{}", group_id, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::persona::PersonaRegistry;
    use crate::types::{GroupSummary, SimulationOutcome, StageResult, TimePerception};

    fn stage(n: u32) -> StageResult {
        StageResult {
            stage_number: n,
            stage_name: format!("Stage {}", n),
            actual_minutes: 5.0,
            time_perception: TimePerception::JustRight,
            ease_of_use: 8,
            clarity: 8,
            value: 8,
            pain_points: vec![],
            positive_points: vec![],
            suggestions: vec![],
            would_continue: true,
            emotional_state: "calm".into(),
            degraded: false,
            fallback_reason: None,
            attempts: 1,
        }
    }

    fn artifact(group: &str, persona: &str) -> PersonaSimulationResult {
        let persona = PersonaRegistry::bundled().unwrap().get(persona).unwrap().clone();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PersonaSimulationResult::new("run-1", group, persona, vec![stage(1), stage(2)], SimulationOutcome::Completed, at, at)
    }

    fn populate(store: &ArtifactStore) {
        let results: Vec<_> = ["P001", "P002", "P003"].iter().map(|p| artifact("group1", p)).collect();
        let mut names = Vec::new();
        for result in &results {
            names.push(store.write_result(result).unwrap());
        }
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let summary = GroupSummary::new("run-1", "group1", "Group 1", results, 0, names, at, at);
        store.write_group_summary(&summary).unwrap();
    }

    #[test]
    fn test_loads_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);

        let corpus = load_corpus(&store, 2).unwrap();
        assert_eq!(corpus.results.len(), 3);
        assert!(corpus.skipped.is_empty());
        assert_eq!(corpus.sources.len(), 1);
        assert_eq!(corpus.sources[0].run_id.as_deref(), Some("run-1"));
        assert_eq!(corpus.sources[0].artifacts_loaded, 3);
        assert_eq!(corpus.fingerprint.len(), 64);
    }

    #[test]
    fn test_deleted_artifact_is_skipped_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);
        fs::remove_file(dir.path().join("group1").join("P002_result.json")).unwrap();

        let corpus = load_corpus(&store, 2).unwrap();
        assert_eq!(corpus.results.len(), 2);
        assert_eq!(corpus.skipped.len(), 1);
        assert_eq!(corpus.skipped[0].path, "group1/P002_result.json");
        assert!(corpus.skipped[0].reason.contains("missing"));
    }

    #[test]
    fn test_corrupt_and_inconsistent_artifacts_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);
        fs::write(dir.path().join("group1").join("P001_result.json"), "{ not json").unwrap();

        let corpus = load_corpus(&store, 2).unwrap();
        assert_eq!(corpus.results.len(), 2);
        assert_eq!(corpus.skipped[0].path, "group1/P001_result.json");

        // The remaining artifacts hold more stages than a one-stage catalog
        let err = load_corpus(&store, 1).unwrap_err();
        assert!(matches!(err, Error::NoArtifacts { .. }));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);

        let before = load_corpus(&store, 2).unwrap().fingerprint;
        assert_eq!(before, load_corpus(&store, 2).unwrap().fingerprint);

        fs::remove_file(dir.path().join("group1").join("P003_result.json")).unwrap();
        assert_ne!(before, load_corpus(&store, 2).unwrap().fingerprint);
    }

    #[test]
    fn test_artifact_from_older_run_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);
        let mut older = artifact("group1", "P004");
        older.run_id = "run-0".into();
        store.write_result(&older).unwrap();

        let corpus = load_corpus(&store, 2).unwrap();
        assert_eq!(corpus.results.len(), 3);
        assert_eq!(corpus.skipped.len(), 1);
        assert_eq!(corpus.skipped[0].path, "group1/P004_result.json");
        assert!(corpus.skipped[0].reason.contains("run-0"));
        assert_eq!(corpus.sources[0].artifacts_loaded, 3);
    }

    #[test]
    fn test_persona_counted_once_across_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        populate(&store);
        // group2 has no summary, and its P002 finished later
        let mut newer = artifact("group2", "P002");
        newer.finished_at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        store.write_result(&newer).unwrap();

        let corpus = load_corpus(&store, 2).unwrap();
        assert_eq!(corpus.results.len(), 3);
        let p002 = corpus.results.iter().find(|r| r.persona.id == "P002").unwrap();
        assert_eq!(p002.group_id, "group2");
        assert_eq!(corpus.skipped.len(), 1);
        assert_eq!(corpus.skipped[0].path, "group1/P002_result.json");
        assert!(corpus.skipped[0].reason.contains("superseded by group2/P002_result.json"));

        let loaded: Vec<(&str, usize)> = corpus
            .sources
            .iter()
            .map(|s| (s.group_id.as_str(), s.artifacts_loaded))
            .collect();
        assert_eq!(loaded, vec![("group1", 2), ("group2", 1)]);
    }

    #[test]
    fn test_empty_directory_has_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_corpus(&ArtifactStore::new(dir.path()), 11).unwrap_err();
        assert!(matches!(err, Error::NoArtifacts { .. }));
    }
}
