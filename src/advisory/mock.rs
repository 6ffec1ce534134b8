//! Mock advisory backend
//!
//! Produces deterministic, schema-valid replies derived from a SHA-256 of
//! the seed, persona id and stage number, so offline runs are repeatable.
//! Failures, rejections and early exits can be scripted for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::MockSettings;
use crate::error::{Error, Result};
use crate::persona::DigitalMaturity;

use super::traits::{AdvisoryBackend, AdvisoryRequest};

const PAIN_POINTS: &[&str] = &[
    "Too many input fields on one screen",
    "Instructions are unclear",
    "AI output needs manual correction",
    "Hard to know what level of detail to enter",
    "Takes longer than expected",
    "Terminology is confusing",
];

const POSITIVE_POINTS: &[&str] = &[
    "Clear structure",
    "Saves time compared to manual work",
    "Useful AI suggestions",
    "Easy to navigate",
];

const SUGGESTIONS: &[&str] = &[
    "Provide worked examples",
    "Add a progress indicator",
    "Allow saving drafts",
    "Offer a short tutorial video",
    "Pre-fill fields from earlier stages",
];

const MALFORMED_REPLY: &str = "I found this stage quite reasonable overall, thanks for asking.";

/// Deterministic offline backend
pub struct MockBackend {
    seed: String,
    latency: Duration,
    malformed_percent: u8,
    dropouts: HashSet<(String, u32)>,
    rejected: HashSet<String>,
    fixed_response: Option<String>,
    always_fail: bool,
    failures_remaining: AtomicU32,
    calls: Mutex<Vec<(String, u32)>>,
    attempts: Mutex<HashMap<(String, u32), u32>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            seed: "pilot".to_string(),
            latency: Duration::ZERO,
            malformed_percent: 0,
            dropouts: HashSet::new(),
            rejected: HashSet::new(),
            fixed_response: None,
            always_fail: false,
            failures_remaining: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &MockSettings) -> Self {
        let mut backend = Self::new()
            .with_seed(&settings.seed)
            .with_latency(Duration::from_millis(settings.latency_ms))
            .with_malformed_percent(settings.malformed_percent);
        for dropout in &settings.dropouts {
            backend = backend.with_dropout(&dropout.persona, dropout.stage);
        }
        for persona in &settings.reject_personas {
            backend = backend.reject_persona(persona);
        }
        backend
    }

    pub fn with_seed(mut self, seed: &str) -> Self {
        self.seed = seed.to_string();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_malformed_percent(mut self, percent: u8) -> Self {
        self.malformed_percent = percent.min(100);
        self
    }

    /// The persona answers wouldContinue=false at `stage`
    pub fn with_dropout(mut self, persona_id: &str, stage: u32) -> Self {
        self.dropouts.insert((persona_id.to_string(), stage));
        self
    }

    /// Every call for the persona fails with a non-retryable rejection
    pub fn reject_persona(mut self, persona_id: &str) -> Self {
        self.rejected.insert(persona_id.to_string());
        self
    }

    /// Return this text verbatim instead of a generated reply
    #[cfg(test)]
    pub fn with_fixed_response(mut self, text: impl Into<String>) -> Self {
        self.fixed_response = Some(text.into());
        self
    }

    /// The first `n` calls fail with a transient error
    #[cfg(test)]
    pub fn fail_first(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Every call fails with a transient error
    pub fn always_fail(mut self) -> Self {
        self.always_fail = true;
        self
    }

    #[cfg(test)]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Stage numbers requested for a persona, in call order
    #[cfg(test)]
    pub fn calls_for(&self, persona_id: &str) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == persona_id)
            .map(|(_, s)| *s)
            .collect()
    }

    fn hash(&self, parts: &[&str]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        for part in parts {
            hasher.update([0u8]);
            hasher.update(part.as_bytes());
        }
        hasher.finalize().into()
    }

    fn generate_reply(&self, request: &AdvisoryRequest) -> String {
        let stage = request.stage_number.to_string();
        let h = self.hash(&[&request.persona_id, &stage]);

        let penalty = match request.maturity {
            DigitalMaturity::Beginner => 2,
            DigitalMaturity::Intermediate => 1,
            DigitalMaturity::Advanced | DigitalMaturity::Expert => 0,
        };
        let rate = |b: u8| (6 + b % 4).saturating_sub(penalty).max(1);
        let (ease, clarity, value) = (rate(h[0]), rate(h[1]), rate(h[2]));

        let ratio = 0.7 + (h[3] % 70) as f64 / 100.0;
        let actual_minutes = (request.expected_minutes * ratio * 10.0).round() / 10.0;
        let time_perception = if ratio < 0.85 {
            "TooShort"
        } else if ratio > 1.2 {
            "TooLong"
        } else {
            "JustRight"
        };

        let composite = (ease + clarity + value) as f64 / 3.0;
        let pain_count = if composite < 7.5 { 1 + (h[4] % 2) as usize } else { (h[4] % 2) as usize };
        let pain_points: Vec<&str> = (0..pain_count)
            .map(|i| PAIN_POINTS[(h[5 + i] as usize) % PAIN_POINTS.len()])
            .collect::<Vec<_>>();
        let positive_points = vec![POSITIVE_POINTS[(h[8] as usize) % POSITIVE_POINTS.len()]];
        let suggestions = vec![SUGGESTIONS[(h[9] as usize) % SUGGESTIONS.len()]];

        let would_continue = !self
            .dropouts
            .contains(&(request.persona_id.clone(), request.stage_number));
        let emotional_state = match (would_continue, composite) {
            (false, _) => "frustrated",
            (true, c) if c >= 8.0 => "engaged",
            (true, c) if c >= 6.5 => "calm",
            _ => "uneasy",
        };

        json!({
            "actualMinutes": actual_minutes,
            "timePerception": time_perception,
            "easeOfUse": ease,
            "clarity": clarity,
            "value": value,
            "painPoints": pain_points,
            "positivePoints": positive_points,
            "suggestions": suggestions,
            "wouldContinue": would_continue,
            "emotionalState": emotional_state,
        })
        .to_string()
    }
}

#[async_trait]
impl AdvisoryBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &AdvisoryRequest) -> Result<String> {
        self.calls
            .lock()
            .push((request.persona_id.clone(), request.stage_number));

        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts
                .entry((request.persona_id.clone(), request.stage_number))
                .or_insert(0);
            *entry += 1;
            *entry
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.rejected.contains(&request.persona_id) {
            return Err(Error::AdvisoryRejected {
                status: 400,
                message: format!("mock rejects persona {}", request.persona_id),
            });
        }
        if self.always_fail {
            return Err(Error::transient("mock service unavailable"));
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::transient("mock service unavailable"));
        }

        if let Some(ref fixed) = self.fixed_response {
            return Ok(fixed.clone());
        }

        if self.malformed_percent > 0 {
            let stage = request.stage_number.to_string();
            let attempt = attempt.to_string();
            let roll = self.hash(&[&request.persona_id, &stage, &attempt])[0] % 100;
            if roll < self.malformed_percent {
                return Ok(MALFORMED_REPLY.to_string());
            }
        }

        Ok(self.generate_reply(request))
    }
}
