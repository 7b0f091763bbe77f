//! OpenAI-compatible chat and embedding endpoints, including Azure OpenAI
//! deployments (`api-key` header plus an `api-version` query parameter).

use http::{
    Method, Request, Response,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::{
    HTTPLLMProvider, ToolCall, Usage,
    chat::{
        ChatMessage, ChatResponse, ChatRole, FinishReason, MessageType, Tool,
        http::HTTPChatProvider,
    },
    embedding::http::HTTPEmbeddingProvider,
    error::LLMError,
    handle_http_error,
};

/// How the API key is presented to the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `Authorization: Bearer <key>` (OpenAI and most compatible hosts)
    #[default]
    Bearer,
    /// `api-key: <key>` (Azure OpenAI)
    ApiKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    /// Endpoint root. For Azure this is the deployment URL,
    /// e.g. `https://res.openai.azure.com/openai/deployments/gpt-4o/`.
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub api_version: Option<String>,
    pub auth_type: AuthType,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

pub struct OpenAI {
    cfg: OpenAIConfig,
}

impl OpenAI {
    pub fn new(mut cfg: OpenAIConfig) -> Self {
        // Url::join replaces the last segment unless the base ends with a slash.
        if !cfg.base_url.path().ends_with('/') {
            let path = format!("{}/", cfg.base_url.path());
            cfg.base_url.set_path(&path);
        }
        Self { cfg }
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.cfg
    }

    fn endpoint(&self, path: &str) -> Result<Url, LLMError> {
        let mut url = self.cfg.base_url.join(path)?;
        if let Some(version) = &self.cfg.api_version {
            url.query_pairs_mut().append_pair("api-version", version);
        }
        Ok(url)
    }

    fn post(&self, url: Url, body: Vec<u8>) -> Result<Request<Vec<u8>>, LLMError> {
        if self.cfg.api_key.is_empty() {
            return Err(LLMError::AuthError("Missing OpenAI API key".to_string()));
        }
        let builder = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header(CONTENT_TYPE, "application/json");
        let builder = match self.cfg.auth_type {
            AuthType::Bearer => {
                builder.header(AUTHORIZATION, format!("Bearer {}", self.cfg.api_key))
            }
            AuthType::ApiKey => builder.header("api-key", self.cfg.api_key.as_str()),
        };
        Ok(builder.body(body)?)
    }
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// Individual message in an OpenAI chat conversation.
#[derive(Serialize, Debug)]
struct OpenAIChatMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<&'a [ToolCall]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for OpenAIChatMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        let role = match msg.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        match &msg.message_type {
            MessageType::Text => OpenAIChatMessage {
                role,
                content: Some(msg.content.as_str()),
                tool_calls: None,
                tool_call_id: None,
            },
            MessageType::ToolUse(calls) => OpenAIChatMessage {
                role,
                content: (!msg.content.is_empty()).then_some(msg.content.as_str()),
                tool_calls: Some(calls.as_slice()),
                tool_call_id: None,
            },
            MessageType::ToolResult { call_id, .. } => OpenAIChatMessage {
                role: "tool",
                content: Some(msg.content.as_str()),
                tool_calls: None,
                tool_call_id: Some(call_id.as_str()),
            },
        }
    }
}

/// Response from OpenAI's chat API endpoint.
#[derive(Deserialize, Debug)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatChoice {
    finish_reason: Option<String>,
    message: OpenAIChatMsg,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatMsg {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

impl ChatResponse for OpenAIChatResponse {
    fn text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.content.clone())
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.clone())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(|reason| match reason {
                "stop" => FinishReason::Stop,
                "length" => FinishReason::Length,
                "content_filter" => FinishReason::ContentFilter,
                "tool_calls" | "function_call" => FinishReason::ToolCalls,
                _ => FinishReason::Unknown,
            })
    }
}

impl fmt::Display for OpenAIChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(choice) = self.choices.first() else {
            return Ok(());
        };
        for call in choice.message.tool_calls.iter().flatten() {
            writeln!(f, "{}({})", call.function.name, call.function.arguments)?;
        }
        if let Some(content) = &choice.message.content {
            write!(f, "{}", content)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

impl HTTPChatProvider for OpenAI {
    fn chat_request(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Request<Vec<u8>>, LLMError> {
        let tools = tools.filter(|t| !t.is_empty());
        let body = OpenAIChatRequest {
            model: &self.cfg.model,
            messages: messages.iter().map(OpenAIChatMessage::from).collect(),
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
            tools,
            tool_choice: tools.map(|_| "auto"),
        };
        let json_body = serde_json::to_vec(&body)?;
        self.post(self.endpoint("chat/completions")?, json_body)
    }

    fn parse_chat(&self, response: Response<Vec<u8>>) -> Result<Box<dyn ChatResponse>, LLMError> {
        handle_http_error!(response);

        match serde_json::from_slice::<OpenAIChatResponse>(response.body()) {
            Ok(parsed) if !parsed.choices.is_empty() => Ok(Box::new(parsed)),
            Ok(_) => Err(LLMError::ResponseFormatError {
                message: "response contained no choices".to_string(),
                raw_response: String::from_utf8_lossy(response.body()).into_owned(),
            }),
            Err(e) => Err(LLMError::ResponseFormatError {
                message: format!("Failed to decode API response: {}", e),
                raw_response: String::from_utf8_lossy(response.body()).into_owned(),
            }),
        }
    }
}

impl HTTPEmbeddingProvider for OpenAI {
    fn embed_request(&self, inputs: &[String]) -> Result<Request<Vec<u8>>, LLMError> {
        let body = OpenAIEmbeddingRequest {
            model: &self.cfg.model,
            input: inputs,
        };
        let json_body = serde_json::to_vec(&body)?;
        self.post(self.endpoint("embeddings")?, json_body)
    }

    fn parse_embed(&self, response: Response<Vec<u8>>) -> Result<Vec<Vec<f32>>, LLMError> {
        handle_http_error!(response);

        let mut parsed: OpenAIEmbeddingResponse =
            serde_json::from_slice(response.body()).map_err(|e| LLMError::ResponseFormatError {
                message: format!("Failed to decode embedding response: {}", e),
                raw_response: String::from_utf8_lossy(response.body()).into_owned(),
            })?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl HTTPLLMProvider for OpenAI {
    fn timeout(&self) -> Option<Duration> {
        self.cfg.timeout_seconds.map(Duration::from_secs)
    }
}
