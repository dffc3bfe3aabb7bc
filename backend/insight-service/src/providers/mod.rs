//! Content generation providers

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::Result;

/// Text-in, text-out generation collaborator
///
/// Implementations report transport and API errors as
/// `InsightError::GenerationFailure`. Timeouts are imposed by the caller.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
