use crate::{
    HTTPLLMProvider,
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    embedding::EmbeddingProvider,
    error::LLMError,
    outbound::call_outbound,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Runs an [`HTTPLLMProvider`] through the shared outbound client.
pub struct LLMProviderFromHTTP {
    inner: Arc<dyn HTTPLLMProvider>,
}

impl LLMProviderFromHTTP {
    pub fn new(inner: Arc<dyn HTTPLLMProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatProvider for LLMProviderFromHTTP {
    #[instrument(
        name = "http_adapter.chat_with_tools",
        skip_all,
        fields(messages = messages.len())
    )]
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        let req = self.inner.chat_request(messages, tools)?;
        let resp = call_outbound(req, self.inner.timeout()).await?;
        log::trace!("chat response status {}", resp.status());
        self.inner.parse_chat(resp)
    }
}

#[async_trait]
impl EmbeddingProvider for LLMProviderFromHTTP {
    #[instrument(name = "http_adapter.embed", skip_all, fields(inputs = input.len()))]
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        let req = self.inner.embed_request(&input)?;
        let resp = call_outbound(req, self.inner.timeout()).await?;
        log::trace!("embedding response status {}", resp.status());
        self.inner.parse_embed(resp)
    }
}
