//! Language model trait used for answer synthesis.

use async_trait::async_trait;

use crate::error::Result;

/// A text-completion service: prompt in, answer text out.
///
/// Failures surface as [`RagError::ModelError`](crate::RagError::ModelError)
/// with the backend's error text preserved. No retry is applied.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// A short name identifying the model in logs and errors.
    fn name(&self) -> &str;
}
