//! Artifact store
//!
//! Layout under the output directory:
//!
//! ```text
//! <output>/
//!   group1/
//!     P001_result.json
//!     ...
//!     group_summary.json
//!   group2/
//!   final_report.json
//!   final_report.md
//! ```
//!
//! Every file is written to a temporary sibling first and renamed into
//! place, so a reader never sees a half-written artifact.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{GroupSummary, PersonaSimulationResult};

pub const RESULT_SUFFIX: &str = "_result.json";
pub const GROUP_SUMMARY_FILE: &str = "group_summary.json";
pub const REPORT_JSON_FILE: &str = "final_report.json";
pub const REPORT_MARKDOWN_FILE: &str = "final_report.md";

/// What was found in one group directory
#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group_id: String,
    pub dir: PathBuf,
    pub summary_path: Option<PathBuf>,
    /// `*_result.json` files present, sorted by name
    pub result_files: Vec<PathBuf>,
}

/// Flat-file persistence for a results directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group_id: &str) -> PathBuf {
        self.root.join(group_id)
    }

    pub fn result_file_name(persona_id: &str) -> String {
        format!("{}{}", persona_id, RESULT_SUFFIX)
    }

    /// Persist one persona's artifact, returning its file name
    pub fn write_result(&self, result: &PersonaSimulationResult) -> Result<String> {
        let name = Self::result_file_name(&result.persona.id);
        let path = self.group_dir(&result.group_id).join(&name);
        write_json_atomic(&path, result)?;
        debug!(path = %path.display(), persona_id = %result.persona.id, "Artifact written");
        Ok(name)
    }

    pub fn write_group_summary(&self, summary: &GroupSummary) -> Result<PathBuf> {
        let path = self.group_dir(&summary.group_id).join(GROUP_SUMMARY_FILE);
        write_json_atomic(&path, summary)?;
        Ok(path)
    }

    pub fn write_report_json<T: Serialize>(&self, report: &T) -> Result<PathBuf> {
        let path = self.root.join(REPORT_JSON_FILE);
        write_json_atomic(&path, report)?;
        Ok(path)
    }

    pub fn write_report_markdown(&self, markdown: &str) -> Result<PathBuf> {
        let path = self.root.join(REPORT_MARKDOWN_FILE);
        write_atomic(&path, markdown.as_bytes())?;
        Ok(path)
    }

    /// List every group directory, sorted by path
    pub fn discover(&self) -> Result<Vec<GroupListing>> {
        if !self.root.is_dir() {
            return Err(Error::NoArtifacts {
                path: self.root.clone(),
            });
        }

        let dirs: Vec<PathBuf> = read_dir_sorted(&self.root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect();

        let mut listings = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let group_id = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let summary = dir.join(GROUP_SUMMARY_FILE);
            let result_files = read_dir_sorted(&dir)?
                .into_iter()
                .filter(|p| {
                    p.is_file()
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.ends_with(RESULT_SUFFIX))
                })
                .collect();

            listings.push(GroupListing {
                group_id,
                summary_path: summary.is_file().then_some(summary),
                dir,
                result_files,
            });
        }
        Ok(listings)
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::IoRead {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::IoRead {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| Error::IoWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::persona::PersonaRegistry;
    use crate::types::SimulationOutcome;

    fn artifact(group: &str, persona: &str) -> PersonaSimulationResult {
        let persona = PersonaRegistry::bundled().unwrap().get(persona).unwrap().clone();
        let now = Utc::now();
        PersonaSimulationResult::new("run", group, persona, vec![], SimulationOutcome::Completed, now, now)
    }

    #[test]
    fn test_write_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert_eq!(store.write_result(&artifact("group2", "P006")).unwrap(), "P006_result.json");
        store.write_result(&artifact("group1", "P002")).unwrap();
        store.write_result(&artifact("group1", "P001")).unwrap();
        fs::write(dir.path().join("group1").join("notes.txt"), "x").unwrap();

        let listings = store.discover().unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].group_id, "group1");
        assert!(listings[0].summary_path.is_none());
        let names: Vec<_> = listings[0]
            .result_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["P001_result.json", "P002_result.json"]);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_result(&artifact("group1", "P001")).unwrap();
        store.write_result(&artifact("group1", "P001")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("group1")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_root_has_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"));
        assert!(matches!(store.discover(), Err(Error::NoArtifacts { .. })));
    }

    #[test]
    fn test_unwritable_root_is_io_write() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = ArtifactStore::new(&blocker);

        let err = store.write_result(&artifact("group1", "P001")).unwrap_err();
        assert!(matches!(err, Error::IoWrite { .. }));
        assert_eq!(err.exit_code(), 20);
    }
}
