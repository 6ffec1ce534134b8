//! Core types for the persona catalog.
//!
//! A persona is a synthetic workshop participant: static attributes only,
//! loaded once at startup and never mutated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─────────────────────────────────────────────────────────────────
// Digital Maturity
// ─────────────────────────────────────────────────────────────────

/// How comfortable a persona is with digital tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DigitalMaturity {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DigitalMaturity {
    /// All categories, least to most mature.
    pub fn all() -> &'static [DigitalMaturity] {
        &[
            DigitalMaturity::Beginner,
            DigitalMaturity::Intermediate,
            DigitalMaturity::Advanced,
            DigitalMaturity::Expert,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigitalMaturity::Beginner => "Beginner",
            DigitalMaturity::Intermediate => "Intermediate",
            DigitalMaturity::Advanced => "Advanced",
            DigitalMaturity::Expert => "Expert",
        }
    }
}

impl fmt::Display for DigitalMaturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigitalMaturity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(DigitalMaturity::Beginner),
            "intermediate" => Ok(DigitalMaturity::Intermediate),
            "advanced" => Ok(DigitalMaturity::Advanced),
            "expert" => Ok(DigitalMaturity::Expert),
            _ => Err(Error::catalog(
                "persona",
                format!(
                    "unknown digital maturity '{}'. Valid: beginner, intermediate, advanced, expert",
                    s
                ),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// A synthetic workshop participant.
///
/// Serialized in camelCase inside result artifacts; the snake_case keys used
/// by catalog files are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,

    /// Organizational unit (team or department).
    pub department: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    /// Job-function family, e.g. "Marketing".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(alias = "team_size")]
    pub team_size: u32,

    #[serde(alias = "digital_maturity")]
    pub digital_maturity: DigitalMaturity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    /// Years in the current role.
    #[serde(default, alias = "experience_years", skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<f64>,
}

/// Condensed persona attributes attached to report entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaRef {
    pub id: String,
    pub name: String,
    pub department: String,
    pub team_size: u32,
    pub digital_maturity: DigitalMaturity,
}

impl From<&Persona> for PersonaRef {
    fn from(persona: &Persona) -> Self {
        Self {
            id: persona.id.clone(),
            name: persona.name.clone(),
            department: persona.department.clone(),
            team_size: persona.team_size,
            digital_maturity: persona.digital_maturity,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maturity_from_str() {
        assert_eq!("beginner".parse::<DigitalMaturity>().unwrap(), DigitalMaturity::Beginner);
        assert_eq!("EXPERT".parse::<DigitalMaturity>().unwrap(), DigitalMaturity::Expert);
        assert!("guru".parse::<DigitalMaturity>().is_err());
    }

    #[test]
    fn test_maturity_order() {
        let all = DigitalMaturity::all();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_persona_accepts_catalog_keys() {
        let json = r#"{
            "id": "P900",
            "name": "Test",
            "department": "QA",
            "team_size": 4,
            "digital_maturity": "Advanced",
            "experience_years": 2.5
        }"#;
        let persona: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(persona.team_size, 4);
        assert_eq!(persona.digital_maturity, DigitalMaturity::Advanced);
        assert_eq!(persona.age, None);

        let out = serde_json::to_value(&persona).unwrap();
        assert_eq!(out["teamSize"], 4);
        assert_eq!(out["digitalMaturity"], "Advanced");
        assert!(out.get("age").is_none());
    }
}
