//! Mock implementations for testing

use async_trait::async_trait;
use genie::chat::{ChatMessage, ChatProvider, ChatResponse, FinishReason, Tool};
use genie::embedding::EmbeddingProvider;
use genie::error::LLMError;
use genie::{ToolCall, Usage};
use mockall::mock;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::{AcquiredTokens, TokenProvider};
use crate::graph::{DownloadedFile, DriveItem, GraphCredentials, GraphError, SharePointApi};
use crate::site::{SiteError, SiteResolver};
use crate::summarize::{DocumentSummarizer, DocumentSummary, SummarizeError};

// ============================================================================
// MockLlmProvider
// ============================================================================

mock! {
    pub LlmProvider {}

    #[async_trait]
    impl ChatProvider for LlmProvider {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError>;
        async fn chat_with_tools<'a, 'b, 'c>(
            &'a self,
            messages: &'b [ChatMessage],
            tools: Option<&'c [Tool]>,
        ) -> Result<Box<dyn ChatResponse>, LLMError>;
    }

    #[async_trait]
    impl EmbeddingProvider for LlmProvider {
        async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError>;
    }
}

// ============================================================================
// MockSharePoint
// ============================================================================

mock! {
    pub SharePoint {}

    #[async_trait]
    impl SharePointApi for SharePoint {
        async fn my_drive_id(&self, creds: &GraphCredentials) -> Result<String, GraphError>;
        async fn drive_id_by_name(
            &self,
            creds: &GraphCredentials,
            library_name: &str,
        ) -> Result<Option<String>, GraphError>;
        async fn folder_id(
            &self,
            creds: &GraphCredentials,
            drive_id: &str,
            folder_path: &str,
        ) -> Result<Option<String>, GraphError>;
        async fn recent_drive_files(
            &self,
            creds: &GraphCredentials,
            drive_id: &str,
            query: &str,
            top: usize,
        ) -> Result<Vec<DriveItem>, GraphError>;
        async fn recent_my_files(
            &self,
            creds: &GraphCredentials,
            query: &str,
            top: usize,
        ) -> Result<Vec<DriveItem>, GraphError>;
        async fn download_url(
            &self,
            creds: &GraphCredentials,
            drive_id: &str,
            item_id: &str,
        ) -> Result<Option<String>, GraphError>;
        async fn copy_item(
            &self,
            creds: &GraphCredentials,
            item_id: &str,
            dest_drive_id: &str,
            dest_folder_id: &str,
        ) -> Result<(), GraphError>;
        async fn update_item_fields(
            &self,
            creds: &GraphCredentials,
            drive_id: &str,
            item_id: &str,
            fields: &Map<String, Value>,
        ) -> Result<Value, GraphError>;
        async fn site_analytics(
            &self,
            creds: &GraphCredentials,
        ) -> Result<Option<Value>, GraphError>;
        async fn download_by_name(
            &self,
            creds: &GraphCredentials,
            drive_id: &str,
            file_name: &str,
        ) -> Result<DownloadedFile, GraphError>;
        async fn my_display_name(
            &self,
            creds: &GraphCredentials,
        ) -> Result<Option<String>, GraphError>;
    }
}

// ============================================================================
// Identity, site and summarizer mocks
// ============================================================================

mock! {
    pub TokenProvider {}

    #[async_trait]
    impl TokenProvider for TokenProvider {
        async fn acquire<'a, 'b>(&'a self, user_assertion: Option<&'b str>) -> AcquiredTokens;
    }
}

mock! {
    pub SiteResolver {}

    #[async_trait]
    impl SiteResolver for SiteResolver {
        async fn resolve<'a, 'b, 'c>(
            &'a self,
            site_url: &'b str,
            access_token: Option<&'c str>,
        ) -> Result<String, SiteError>;
    }
}

mock! {
    pub Summarizer {}

    #[async_trait]
    impl DocumentSummarizer for Summarizer {
        async fn summarize(
            &self,
            file_name: &str,
            mime_type: &str,
            bytes: Vec<u8>,
        ) -> Result<DocumentSummary, SummarizeError>;
    }
}

// ============================================================================
// MockChatResponse - Mock implementation of ChatResponse
// ============================================================================

#[derive(Debug)]
pub struct MockChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl MockChatResponse {
    pub fn text(text: &str) -> Self {
        Self::with_tools(text, vec![])
    }

    pub fn with_tools(text: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.to_string(),
            tool_calls,
            usage: Some(Usage {
                input_tokens: 100,
                output_tokens: 50,
            }),
        }
    }
}

impl std::fmt::Display for MockChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl ChatResponse for MockChatResponse {
    fn text(&self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text.clone())
        }
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        if self.tool_calls.is_empty() {
            None
        } else {
            Some(self.tool_calls.clone())
        }
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        if self.tool_calls.is_empty() {
            Some(FinishReason::Stop)
        } else {
            Some(FinishReason::ToolCalls)
        }
    }
}

// ============================================================================
// ScriptedProvider - queues predetermined responses
// ============================================================================

const EMBEDDING_DIMS: usize = 32;

/// Chat provider answering from a queue, recording what it was sent.
/// Embeddings are deterministic bag-of-words vectors.
#[derive(Clone)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<Result<MockChatResponse, LLMError>>>>,
    received_messages: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    received_tools: Arc<Mutex<Vec<Vec<Tool>>>>,
    call_count: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<MockChatResponse, LLMError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            received_messages: Arc::new(Mutex::new(Vec::new())),
            received_tools: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Sleeps before every chat answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn received_messages(&self) -> Vec<Vec<ChatMessage>> {
        self.received_messages.lock().await.clone()
    }

    pub async fn received_tools(&self) -> Vec<Vec<Tool>> {
        self.received_tools.lock().await.clone()
    }

    /// Number of chat calls made so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.received_messages.lock().await.push(messages.to_vec());
        self.received_tools
            .lock()
            .await
            .push(tools.map(<[Tool]>::to_vec).unwrap_or_default());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().await;
        match responses.pop_front() {
            Some(Ok(response)) => Ok(Box::new(response)),
            Some(Err(e)) => Err(e),
            None => Err(LLMError::GenericError(
                "No more mock responses available".to_string(),
            )),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(input.iter().map(|text| bag_of_words(text)).collect())
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIMS];
    for word in text.split_whitespace() {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        vector[bucket % EMBEDDING_DIMS] += 1.0;
    }
    vector
}
