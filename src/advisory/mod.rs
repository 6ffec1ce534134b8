//! Advisory service integration
//!
//! The advisory service is the language-model endpoint that plays each
//! persona. This module provides:
//! - The backend trait and request type
//! - An OpenAI-compatible HTTP backend and a deterministic mock
//! - Prompt construction and reply parsing
//! - A client that retries, times out and degrades

mod client;
mod mock;
mod openai;
pub mod parser;
mod prompt;
mod traits;

use std::sync::Arc;

pub use client::AdvisoryClient;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{AdvisoryBackend, AdvisoryRequest};

#[cfg(test)]
pub use client::RetryPolicy;
#[cfg(test)]
pub use prompt::PromptSettings;

use crate::config::{AdvisoryProvider, AdvisorySettings};
use crate::error::Result;

/// Create the backend selected in the configuration
pub fn create_backend(settings: &AdvisorySettings) -> Result<Arc<dyn AdvisoryBackend>> {
    Ok(match settings.provider {
        AdvisoryProvider::OpenAi => Arc::new(OpenAiBackend::new(settings)?),
        AdvisoryProvider::Mock => Arc::new(MockBackend::from_settings(&settings.mock)),
    })
}
