use crate::error::LLMError;
use async_trait::async_trait;

pub mod http;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every input, returning one vector per input in the same order.
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError>;
}
