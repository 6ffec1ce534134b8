//! Stage catalog - the ordered steps of the simulated workshop.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const BUNDLED_STAGES: &str = include_str!("../config/stages.json");

/// One workshop stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescriptor {
    /// Position in the workshop, starting at 1
    pub number: u32,
    pub name: String,
    pub description: String,
    #[serde(alias = "expected_minutes")]
    pub expected_minutes: f64,
}

/// Ordered stage list, numbered 1..N without gaps.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<StageDescriptor>,
}

impl StageCatalog {
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::catalog("stage", "catalog contains no stages"));
        }

        for (index, stage) in stages.iter().enumerate() {
            let expected = index as u32 + 1;
            if stage.number != expected {
                return Err(Error::catalog(
                    "stage",
                    format!(
                        "stage '{}' is numbered {}, expected {}",
                        stage.name, stage.number, expected
                    ),
                ));
            }
            if !(stage.expected_minutes.is_finite() && stage.expected_minutes > 0.0) {
                return Err(Error::catalog(
                    "stage",
                    format!("stage {} has a non-positive expected duration", stage.number),
                ));
            }
        }

        Ok(Self { stages })
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_STAGES)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let stages: Vec<StageDescriptor> = serde_json::from_str(json)
            .map_err(|e| Error::catalog("stage", format!("invalid JSON: {}", e)))?;
        Self::new(stages)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&content)?;
        debug!(path = %path.display(), count = catalog.len(), "Loaded stage catalog");
        Ok(catalog)
    }

    /// Load from an override file when given, else the bundled catalog.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(Path::new(p)),
            None => Self::bundled(),
        }
    }

    /// Stage by its 1-based number
    pub fn get(&self, number: u32) -> Option<&StageDescriptor> {
        number
            .checked_sub(1)
            .and_then(|i| self.stages.get(i as usize))
    }

    pub fn all(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Number of stages (N)
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn last_number(&self) -> u32 {
        self.stages.len() as u32
    }

    /// Sum of expected durations in minutes
    pub fn expected_total_minutes(&self) -> f64 {
        self.stages.iter().map(|s| s.expected_minutes).sum()
    }
}
