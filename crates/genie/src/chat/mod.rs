use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{ToolCall, Usage, error::LLMError};

pub mod http;

/// Role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation
    System,
    /// The user/human participant in the conversation
    User,
    /// The AI assistant participant in the conversation
    Assistant,
    /// The output of one tool invocation
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        f.write_str(role)
    }
}

/// The type of a message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageType {
    /// A text message
    #[default]
    Text,
    /// Tool invocations requested by the assistant
    ToolUse(Vec<ToolCall>),
    /// The answer to exactly one tool invocation
    ToolResult {
        call_id: String,
        tool_name: String,
        is_error: bool,
    },
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of who sent this message
    pub role: ChatRole,
    /// The type of the message
    pub message_type: MessageType,
    /// The text content of the message
    pub content: String,
}

impl ChatMessage {
    pub fn system() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::System)
    }

    pub fn user() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::User)
    }

    pub fn assistant() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::Assistant)
    }

    pub fn tool() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::Tool)
    }

    /// Tool invocations carried by this message, empty unless it is a tool use.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.message_type {
            MessageType::ToolUse(calls) => calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// The invocation id this message answers, if it is a tool result.
    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.message_type {
            MessageType::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ChatMessageBuilder {
    role: ChatRole,
    message_type: MessageType,
    content: String,
}

impl ChatMessageBuilder {
    pub fn new(role: ChatRole) -> Self {
        Self {
            role,
            message_type: MessageType::default(),
            content: String::new(),
        }
    }

    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    pub fn tool_use(mut self, calls: Vec<ToolCall>) -> Self {
        self.message_type = if calls.is_empty() {
            MessageType::Text
        } else {
            MessageType::ToolUse(calls)
        };
        self
    }

    pub fn tool_result(
        mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        is_error: bool,
    ) -> Self {
        self.message_type = MessageType::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            is_error,
        };
        self
    }

    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            message_type: self.message_type,
            content: self.content,
        }
    }
}

/// Represents a function definition for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    /// The name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Represents a tool that can be used in chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// The type of tool (e.g. "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function definition if this is a function tool
    pub function: FunctionTool,
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}

pub trait ChatResponse: fmt::Debug + fmt::Display + Send + Sync {
    fn text(&self) -> Option<String>;
    fn tool_calls(&self) -> Option<Vec<ToolCall>>;
    fn finish_reason(&self) -> Option<FinishReason>;
    fn usage(&self) -> Option<Usage>;
}

impl From<&dyn ChatResponse> for ChatMessage {
    fn from(response: &dyn ChatResponse) -> Self {
        ChatMessage::assistant()
            .content(response.text().unwrap_or_default())
            .tool_use(response.tool_calls().unwrap_or_default())
            .build()
    }
}

impl From<Box<dyn ChatResponse>> for ChatMessage {
    fn from(response: Box<dyn ChatResponse>) -> Self {
        ChatMessage::from(response.as_ref())
    }
}

/// Trait for providers that support chat-style interactions.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.chat_with_tools(messages, None).await
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError>;
}
