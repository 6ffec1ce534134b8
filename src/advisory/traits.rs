//! Advisory backend trait definitions
//!
//! A backend performs exactly one outbound call and returns the raw reply
//! text. Retrying, parsing and degrading are the client's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::persona::DigitalMaturity;

/// One outbound advisory call
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryRequest {
    pub persona_id: String,
    pub maturity: DigitalMaturity,
    pub stage_number: u32,
    pub stage_name: String,
    pub expected_minutes: f64,

    pub system_prompt: String,
    pub prompt: String,

    pub temperature: f32,
    pub max_tokens: u32,
}

/// Transport to an advisory service
///
/// Errors must be classified: `TransientService` for anything worth
/// retrying, `AdvisoryRejected` for refusals, `MalformedResponse` when the
/// transport envelope itself cannot be decoded.
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &AdvisoryRequest) -> Result<String>;

    /// One call bounded by `timeout`.
    ///
    /// Decorators that queue before calling override this so waiting in the
    /// queue does not count against the call.
    async fn complete_within(&self, request: &AdvisoryRequest, timeout: Duration) -> Result<String> {
        match tokio::time::timeout(timeout, self.complete(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(Error::AdvisoryTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<T: AdvisoryBackend + ?Sized> AdvisoryBackend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn complete(&self, request: &AdvisoryRequest) -> Result<String> {
        (**self).complete(request).await
    }

    async fn complete_within(&self, request: &AdvisoryRequest, timeout: Duration) -> Result<String> {
        (**self).complete_within(request, timeout).await
    }
}
