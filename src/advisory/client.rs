//! Advisory client - one stage evaluation with retry and degradation

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::config::AdvisorySettings;
use crate::error::{Error, Result};
use crate::persona::Persona;
use crate::stages::StageDescriptor;
use crate::types::StageResult;

use super::parser::{self, ParseOutcome};
use super::prompt::{self, PromptSettings};
use super::traits::AdvisoryBackend;

/// Longest pause between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How hard to try before degrading
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubled for each one after
    pub backoff: Duration,
    /// Upper bound on a single call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AdvisorySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_millis(settings.retry_backoff_ms),
            call_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Delays between attempts: `backoff`, then doubling, without jitter.
    ///
    /// `max_attempts` is the only cap, so the schedule never gives up on its own.
    fn schedule(&self) -> ExponentialBackoff {
        let mut schedule = ExponentialBackoff {
            initial_interval: self.backoff,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: MAX_RETRY_DELAY,
            max_elapsed_time: None,
            ..Default::default()
        };
        schedule.reset();
        schedule
    }
}

/// Evaluates stages against an advisory backend
pub struct AdvisoryClient {
    backend: Arc<dyn AdvisoryBackend>,
    policy: RetryPolicy,
    prompt: PromptSettings,
}

impl AdvisoryClient {
    pub fn new(backend: Arc<dyn AdvisoryBackend>, policy: RetryPolicy, prompt: PromptSettings) -> Self {
        Self {
            backend,
            policy,
            prompt,
        }
    }

    pub fn from_settings(backend: Arc<dyn AdvisoryBackend>, settings: &AdvisorySettings) -> Self {
        Self::new(
            backend,
            RetryPolicy::from_settings(settings),
            PromptSettings {
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            },
        )
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Evaluate one stage for one persona.
    ///
    /// Transient failures, timeouts and malformed replies are retried up to
    /// the policy's attempt limit, after which a degraded neutral result is
    /// returned. Only non-retryable errors come back as `Err`.
    pub async fn evaluate_stage(
        &self,
        persona: &Persona,
        stage: &StageDescriptor,
        digest: &str,
    ) -> Result<StageResult> {
        let request = prompt::build_request(persona, stage, digest, self.prompt);
        let mut schedule = self.policy.schedule();
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = schedule.next_backoff().unwrap_or(MAX_RETRY_DELAY);
                if !delay.is_zero() {
                    debug!(persona_id = %persona.id, stage = stage.number, attempt, ?delay, "Retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }

            let reply = self.backend.complete_within(&request, self.policy.call_timeout).await;

            let failure = match reply {
                Ok(text) => match parser::parse(&text, stage) {
                    ParseOutcome::Parsed(mut result) => {
                        result.attempts = attempt;
                        return Ok(result);
                    }
                    ParseOutcome::Failed(reason) => Error::malformed(reason),
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            warn!(
                persona_id = %persona.id,
                stage = stage.number,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %failure,
                "Advisory attempt failed"
            );
            last_failure = failure.to_string();
        }

        warn!(
            persona_id = %persona.id,
            stage = stage.number,
            reason = %last_failure,
            "Advisory retries exhausted, recording degraded result"
        );
        Ok(StageResult::degraded(stage, last_failure, self.policy.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::MockBackend;
    use crate::persona::DigitalMaturity;
    use crate::types::{TimePerception, NEUTRAL_SCORE};

    fn persona() -> Persona {
        Persona {
            id: "P001".into(),
            name: "Kim".into(),
            department: "Marketing".into(),
            company: None,
            category: None,
            team_size: 9,
            digital_maturity: DigitalMaturity::Advanced,
            age: None,
            experience_years: None,
        }
    }

    fn stage() -> StageDescriptor {
        StageDescriptor {
            number: 5,
            name: "Work content entry".into(),
            description: String::new(),
            expected_minutes: 15.0,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
            call_timeout: Duration::from_secs(5),
        }
    }

    fn client(backend: Arc<MockBackend>, policy: RetryPolicy) -> AdvisoryClient {
        AdvisoryClient::new(backend, policy, PromptSettings::default())
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let mock = Arc::new(MockBackend::new().fail_first(2));
        let result = client(mock.clone(), fast_policy())
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap();

        assert!(!result.degraded);
        assert_eq!(result.attempts, 3);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_always_failing_degrades() {
        let mock = Arc::new(MockBackend::new().always_fail());
        let result = client(mock.clone(), fast_policy())
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.actual_minutes, 15.0);
        assert_eq!(result.ease_of_use, NEUTRAL_SCORE);
        assert_eq!(result.clarity, NEUTRAL_SCORE);
        assert_eq!(result.value, NEUTRAL_SCORE);
        assert_eq!(result.time_perception, TimePerception::JustRight);
        assert!(result.pain_points.is_empty());
        assert!(result.would_continue);
        assert_eq!(result.emotional_state, "neutral");
        assert!(result.fallback_reason.unwrap().contains("unavailable"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_replies_degrade() {
        let mock = Arc::new(MockBackend::new().with_fixed_response("not json at all"));
        let result = client(mock.clone(), fast_policy())
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap();

        assert!(result.degraded);
        assert!(result.fallback_reason.unwrap().contains("Malformed"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let mock = Arc::new(MockBackend::new().with_latency(Duration::from_millis(200)));
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::ZERO,
            call_timeout: Duration::from_millis(20),
        };
        let result = client(mock.clone(), policy)
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.attempts, 2);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_returned() {
        let mock = Arc::new(MockBackend::new().reject_persona("P001"));
        let err = client(mock.clone(), fast_policy())
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AdvisoryRejected { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            backoff: Duration::from_millis(500),
            ..Default::default()
        };
        let mut schedule = policy.schedule();
        let delays: Vec<u128> = (0..4)
            .map(|_| schedule.next_backoff().unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            backoff: Duration::from_secs(20),
            ..Default::default()
        };
        let mut schedule = policy.schedule();
        schedule.next_backoff();
        assert_eq!(schedule.next_backoff(), Some(MAX_RETRY_DELAY));
    }

    #[tokio::test]
    async fn test_timeout_reports_milliseconds() {
        let mock = Arc::new(MockBackend::new().with_latency(Duration::from_millis(200)));
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Duration::ZERO,
            call_timeout: Duration::from_millis(50),
        };
        let result = client(mock, policy)
            .evaluate_stage(&persona(), &stage(), "none")
            .await
            .unwrap();

        assert_eq!(result.fallback_reason.unwrap(), "Advisory call timed out after 50ms");
    }
}
