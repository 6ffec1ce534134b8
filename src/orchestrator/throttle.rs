//! Shared call throttle
//!
//! Wraps a backend so every persona in the run shares one cap on calls in
//! flight and one minimum spacing between consecutive call starts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::trace;

use crate::advisory::{AdvisoryBackend, AdvisoryRequest};
use crate::config::OrchestratorSettings;
use crate::error::{Error, Result};

/// Backend decorator enforcing the run-wide call budget
pub struct ThrottledBackend {
    inner: Arc<dyn AdvisoryBackend>,
    permits: Semaphore,
    spacing: Duration,
    /// Earliest instant the next call may start
    next_slot: Mutex<Option<Instant>>,
}

impl ThrottledBackend {
    pub fn new(inner: Arc<dyn AdvisoryBackend>, max_in_flight: usize, spacing: Duration) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_in_flight.max(1)),
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    pub fn from_settings(inner: Arc<dyn AdvisoryBackend>, settings: &OrchestratorSettings) -> Self {
        Self::new(
            inner,
            settings.max_in_flight_calls,
            Duration::from_millis(settings.min_call_spacing_ms),
        )
    }

    /// Take a call permit, then wait for the next spacing slot
    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Internal("call throttle closed".to_string()))?;
        self.wait_for_slot().await;
        Ok(permit)
    }

    async fn wait_for_slot(&self) {
        if self.spacing.is_zero() {
            return;
        }
        // Holding the lock while sleeping serializes call starts
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        if let Some(at) = *next_slot {
            if at > now {
                trace!(wait_ms = (at - now).as_millis() as u64, "Spacing advisory call");
                tokio::time::sleep_until(at).await;
            }
        }
        *next_slot = Some(Instant::now() + self.spacing);
    }
}

#[async_trait]
impl AdvisoryBackend for ThrottledBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: &AdvisoryRequest) -> Result<String> {
        let _permit = self.acquire().await?;
        self.inner.complete(request).await
    }

    /// The deadline starts once the permit and the spacing slot are held
    async fn complete_within(&self, request: &AdvisoryRequest, timeout: Duration) -> Result<String> {
        let _permit = self.acquire().await?;
        self.inner.complete_within(request, timeout).await
    }
}
