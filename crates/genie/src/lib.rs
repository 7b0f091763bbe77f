//! Language-model plumbing shared by the Genie agent.
//!
//! The crate splits every provider into a pure request/response half
//! ([`chat::http::HTTPChatProvider`], [`embedding::http::HTTPEmbeddingProvider`])
//! and a single outbound executor, so providers can be tested without a network.

use serde::{Deserialize, Serialize};

pub mod adapters;
pub mod chat;
pub mod embedding;
pub mod error;
pub mod outbound;
pub mod providers;

pub use adapters::LLMProviderFromHTTP;

use chat::{ChatProvider, http::HTTPChatProvider};
use embedding::{EmbeddingProvider, http::HTTPEmbeddingProvider};

/// A provider that can both chat and embed.
pub trait LLMProvider: ChatProvider + EmbeddingProvider {}

impl<T> LLMProvider for T where T: ChatProvider + EmbeddingProvider {}

/// The pure request/response half of an [`LLMProvider`].
pub trait HTTPLLMProvider: HTTPChatProvider + HTTPEmbeddingProvider {
    /// Per-request timeout the executor should apply.
    fn timeout(&self) -> Option<std::time::Duration> {
        None
    }
}

/// Tool call represents a function call that an LLM wants to make.
#[derive(Debug, Deserialize, Serialize, Clone, Eq, PartialEq)]
pub struct ToolCall {
    /// The ID of the tool call.
    pub id: String,
    /// The type of the tool call (usually "function").
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// FunctionCall contains details about which function to call and with what arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Eq, PartialEq)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to pass to the function, serialized as a JSON string.
    pub arguments: String,
}

/// Token usage reported by a provider.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, Eq, PartialEq)]
pub struct Usage {
    #[serde(alias = "prompt_tokens", alias = "input_tokens")]
    pub input_tokens: u32,
    #[serde(alias = "completion_tokens", alias = "output_tokens")]
    pub output_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
    }
}

/// Returns early from a response parser when the provider answered with a
/// non-success status, keeping the body for diagnostics.
#[macro_export]
macro_rules! handle_http_error {
    ($resp:expr) => {{
        let status = $resp.status();
        if !status.is_success() {
            let body = String::from_utf8_lossy($resp.body()).into_owned();
            if matches!(status.as_u16(), 401 | 403) {
                return Err($crate::error::LLMError::AuthError(format!(
                    "HTTP {}: {}",
                    status, body
                )));
            }
            return Err($crate::error::LLMError::ProviderError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }
    }};
}
