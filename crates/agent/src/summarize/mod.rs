//! Retrieval-augmented document summarization.
//!
//! Every call extracts the document, splits it, embeds the chunks into a
//! fresh [`VectorIndex`] and asks the chat model to summarize the chunks
//! closest to a fixed summarization query. Nothing is cached between calls.

use async_trait::async_trait;
use genie::chat::{ChatMessage, ChatProvider};
use genie::embedding::EmbeddingProvider;
use genie::error::LLMError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::extract::{self, ExtractError};

pub mod index;
pub mod splitter;

pub use index::VectorIndex;
pub use splitter::{CharacterTextSplitter, Chunk};

pub const SUMMARY_QUERY: &str = "Please provide a brief, neutral summary of the document in 3–4 sentences, and suggest a short, clear title that reflects its main topic.";

const FORMAT_INSTRUCTIONS: &str = r#"The output should be formatted as a JSON object with exactly these fields:
{"title": "<title of the document>", "summary": "<summary>"}
Return only the JSON object."#;

pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub title: String,
    pub summary: String,
}

impl DocumentSummary {
    /// The `Summary` column value: `<title>|<summary>`.
    pub fn metadata_value(&self) -> String {
        format!("{}|{}", self.title, self.summary)
    }
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("text extraction failed: {0}")]
    Extract(ExtractError),

    #[error("document contains no text")]
    EmptyDocument,

    #[error("embedding failed: {0}")]
    Embedding(LLMError),

    #[error("model call failed: {0}")]
    Model(LLMError),

    #[error("could not parse summary: {0}")]
    Parse(String),
}

impl From<ExtractError> for SummarizeError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Unsupported(mime) => SummarizeError::Unsupported(mime),
            other => SummarizeError::Extract(other),
        }
    }
}

#[async_trait]
pub trait DocumentSummarizer: Send + Sync {
    async fn summarize(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentSummary, SummarizeError>;
}

pub struct RetrievalSummarizer {
    chat: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: CharacterTextSplitter,
    top_k: usize,
}

impl RetrievalSummarizer {
    pub fn new(chat: Arc<dyn ChatProvider>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            chat,
            embedder,
            splitter: CharacterTextSplitter::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_splitter(mut self, splitter: CharacterTextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    fn prompt(context: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system()
                .content(format!(
                    "Answer any user questions based solely on the context below:\n\n<context>\n{}\n</context>",
                    context
                ))
                .build(),
            ChatMessage::user()
                .content(format!("{}\n\n{}", SUMMARY_QUERY, FORMAT_INSTRUCTIONS))
                .build(),
        ]
    }
}

#[async_trait]
impl DocumentSummarizer for RetrievalSummarizer {
    #[instrument(name = "summarize.document", skip(self, bytes), fields(size = bytes.len()))]
    async fn summarize(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentSummary, SummarizeError> {
        if !extract::is_supported(mime_type) {
            return Err(SummarizeError::Unsupported(mime_type.to_string()));
        }
        let sections = extract::extract_text_blocking(bytes, mime_type.to_string()).await?;
        let chunks = self.splitter.split_sections(&sections);
        if chunks.is_empty() {
            return Err(SummarizeError::EmptyDocument);
        }
        debug!("{} split into {} chunks", file_name, chunks.len());

        let mut inputs: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        inputs.push(SUMMARY_QUERY.to_string());
        let mut vectors = self
            .embedder
            .embed(inputs)
            .await
            .map_err(SummarizeError::Embedding)?;
        if vectors.len() != chunks.len() + 1 {
            return Err(SummarizeError::Embedding(LLMError::ResponseFormatError {
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len() + 1,
                    vectors.len()
                ),
                raw_response: String::new(),
            }));
        }
        let query = vectors.pop().unwrap_or_default();

        let index = VectorIndex::new(chunks, vectors);
        let context = index
            .search(&query, self.top_k)
            .into_iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let response = self
            .chat
            .chat(&Self::prompt(&context))
            .await
            .map_err(SummarizeError::Model)?;
        parse_summary(&response.text().unwrap_or_default())
    }
}

/// Parses the model's JSON answer, tolerating code fences and surrounding prose.
pub fn parse_summary(raw: &str) -> Result<DocumentSummary, SummarizeError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => return Err(SummarizeError::Parse(format!("no JSON object in {:?}", raw))),
    };
    serde_json::from_str(json).map_err(|e| SummarizeError::Parse(e.to_string()))
}
