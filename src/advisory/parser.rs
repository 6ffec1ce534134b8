//! Advisory reply parsing
//!
//! Turns raw reply text into a validated `StageResult` or a failure reason.
//! Parsing never returns an error; the client decides what to do with a
//! failed parse.

use serde::Deserialize;

use crate::stages::StageDescriptor;
use crate::types::{StageResult, TimePerception};

/// Result of parsing one reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(StageResult),
    Failed(String),
}

impl ParseOutcome {
    #[cfg(test)]
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }
}

/// Wire shape of a reply. Every field is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageReply {
    actual_minutes: f64,
    time_perception: String,
    ease_of_use: f64,
    clarity: f64,
    value: f64,
    pain_points: Vec<String>,
    positive_points: Vec<String>,
    suggestions: Vec<String>,
    would_continue: bool,
    emotional_state: String,
}

/// Parse a reply for `stage`.
///
/// The whole text is tried first; failing that, the span from the first
/// `{` to the last `}`, which covers prose and code fences around the
/// object.
pub fn parse(text: &str, stage: &StageDescriptor) -> ParseOutcome {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Failed("empty reply".to_string());
    }

    let reply = match serde_json::from_str::<StageReply>(trimmed) {
        Ok(reply) => reply,
        Err(whole_err) => match extract_object(trimmed) {
            Some(candidate) if candidate.len() < trimmed.len() => {
                match serde_json::from_str::<StageReply>(candidate) {
                    Ok(reply) => reply,
                    Err(e) => return ParseOutcome::Failed(format!("invalid reply object: {}", e)),
                }
            }
            Some(_) => return ParseOutcome::Failed(format!("invalid reply object: {}", whole_err)),
            None => return ParseOutcome::Failed("no JSON object in reply".to_string()),
        },
    };

    match validate(reply, stage) {
        Ok(result) => ParseOutcome::Parsed(result),
        Err(reason) => ParseOutcome::Failed(reason),
    }
}

fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn score(name: &str, raw: f64) -> Result<u8, String> {
    if raw.fract() != 0.0 || !(1.0..=10.0).contains(&raw) {
        return Err(format!("{} must be an integer from 1 to 10, got {}", name, raw));
    }
    Ok(raw as u8)
}

fn validate(reply: StageReply, stage: &StageDescriptor) -> Result<StageResult, String> {
    if !reply.actual_minutes.is_finite() || reply.actual_minutes < 0.0 {
        return Err(format!("actualMinutes must be a non-negative number, got {}", reply.actual_minutes));
    }

    let time_perception = TimePerception::parse_loose(&reply.time_perception)
        .ok_or_else(|| format!("unknown timePerception '{}'", reply.time_perception))?;

    let emotional_state = reply.emotional_state.trim();
    if emotional_state.is_empty() {
        return Err("emotionalState is empty".to_string());
    }

    Ok(StageResult {
        stage_number: stage.number,
        stage_name: stage.name.clone(),
        actual_minutes: reply.actual_minutes,
        time_perception,
        ease_of_use: score("easeOfUse", reply.ease_of_use)?,
        clarity: score("clarity", reply.clarity)?,
        value: score("value", reply.value)?,
        pain_points: clean_list(reply.pain_points),
        positive_points: clean_list(reply.positive_points),
        suggestions: clean_list(reply.suggestions),
        would_continue: reply.would_continue,
        emotional_state: emotional_state.to_string(),
        degraded: false,
        fallback_reason: None,
        attempts: 1,
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
