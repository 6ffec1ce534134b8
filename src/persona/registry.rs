//! Persona registry - the static participant catalog.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::types::{DigitalMaturity, Persona};
use crate::error::{Error, Result};

const BUNDLED_PERSONAS: &str = include_str!("../../config/personas.json");

/// Immutable, ordered catalog of personas.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Build a registry, rejecting empty catalogs and duplicate ids.
    pub fn new(personas: Vec<Persona>) -> Result<Self> {
        if personas.is_empty() {
            return Err(Error::catalog("persona", "catalog contains no personas"));
        }

        let mut seen = HashSet::new();
        for persona in &personas {
            if persona.id.trim().is_empty() {
                return Err(Error::catalog("persona", "persona with empty id"));
            }
            if !seen.insert(persona.id.as_str()) {
                return Err(Error::catalog(
                    "persona",
                    format!("duplicate persona id '{}'", persona.id),
                ));
            }
            if persona.team_size == 0 {
                return Err(Error::catalog(
                    "persona",
                    format!("persona '{}' has a team size of zero", persona.id),
                ));
            }
        }

        Ok(Self { personas })
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_PERSONAS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let personas: Vec<Persona> = serde_json::from_str(json)
            .map_err(|e| Error::catalog("persona", format!("invalid JSON: {}", e)))?;
        Self::new(personas)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&content)?;
        debug!(path = %path.display(), count = registry.len(), "Loaded persona catalog");
        Ok(registry)
    }

    /// Load from an override file when given, else the bundled catalog.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(Path::new(p)),
            None => Self::bundled(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Personas in catalog order, narrowed by explicit ids and/or maturity.
    ///
    /// Explicit ids keep the order the caller gave them in. Unknown ids are
    /// an error rather than being dropped.
    pub fn select(
        &self,
        ids: &[String],
        maturity: Option<DigitalMaturity>,
        count: Option<usize>,
    ) -> Result<Vec<Persona>> {
        let mut selected: Vec<Persona> = if ids.is_empty() {
            self.personas.clone()
        } else {
            ids.iter()
                .map(|id| {
                    self.get(id)
                        .cloned()
                        .ok_or_else(|| Error::PersonaNotFound(id.clone()))
                })
                .collect::<Result<_>>()?
        };

        if let Some(m) = maturity {
            selected.retain(|p| p.digital_maturity == m);
        }
        if let Some(n) = count {
            selected.truncate(n);
        }
        Ok(selected)
    }
}
