//! AI adapter trait: the abstraction over concrete LLM vendors.
//!
//! The analyzer only needs three capabilities: generate text from a prompt,
//! count tokens for a text, and report the model's context ceiling.
//! Implementations must be safe to share across concurrent requests.

use argus_core::AiError;
use async_trait::async_trait;

/// Bridge between the [`crate::Analyzer`] and a concrete LLM.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Send a prompt and return the raw model output.
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;

    /// Count tokens the model would consume for `text`.
    async fn count_tokens(&self, text: &str) -> Result<usize, AiError>;

    /// The model's context ceiling, in tokens. Constant per adapter.
    fn max_tokens(&self) -> usize;
}
