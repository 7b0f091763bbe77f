//! The loop controller.
//!
//! A turn alternates between asking the model for a message (REASON) and
//! running the tool calls that message requests (ACT) until the model answers
//! in plain text or the step limit is reached.

use genie::chat::{ChatMessage, ChatProvider, ChatResponse, Tool};
use genie::{ToolCall, Usage};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Instrument, instrument};

use crate::context::{self, ContextKey};
use crate::error::{AgentError, Result};
use crate::tools::ToolRegistry;

pub mod limits;
pub mod prompt;
pub mod state;

pub use limits::LimitsConfig;
pub use state::{ExecutionState, StopReason};

/// One executed tool call, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallSummary {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub is_error: bool,
}

impl ToolCallSummary {
    fn new(call: &ToolCall, is_error: bool) -> Self {
        let arguments = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
        Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments,
            is_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub tool_calls: Vec<ToolCallSummary>,
    pub stop_reason: StopReason,
    /// Model calls made during the turn.
    pub steps: usize,
    pub usage: Usage,
}

pub struct Agent {
    provider: Arc<dyn ChatProvider>,
    tools: ToolRegistry,
    limits: LimitsConfig,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        mut tools: ToolRegistry,
        limits: LimitsConfig,
    ) -> Self {
        tools.set_call_timeout(Some(limits.tool_timeout()));
        Self {
            provider,
            tools,
            limits,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Runs one turn over `history`, which must already end with the user's
    /// message. Every message the turn produces is appended to `history`;
    /// on error the appended tail is incomplete and should be discarded.
    pub async fn run_turn(&self, history: &mut Vec<ChatMessage>) -> Result<TurnOutcome> {
        let limit = self.limits.turn_timeout();
        let span = tracing::info_span!("agent.turn", history_len = history.len());
        match tokio::time::timeout(limit, self.drive(history).instrument(span)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::TurnTimeout {
                seconds: limit.as_secs(),
            }),
        }
    }

    async fn drive(&self, history: &mut Vec<ChatMessage>) -> Result<TurnOutcome> {
        let definitions = self.tools.definitions();
        let mut state = ExecutionState::Reason;
        let mut steps = 0usize;
        let mut usage = Usage::default();
        let mut summaries = Vec::new();

        loop {
            debug!("turn state: {} (step {})", state.name(), steps);
            state = match state {
                ExecutionState::Reason if steps >= self.limits.max_steps => {
                    info!("step limit of {} reached", self.limits.max_steps);
                    let reply = format!(
                        "I stopped after {} steps without reaching a final answer. \
                         Please narrow the request or try again.",
                        steps
                    );
                    history.push(ChatMessage::assistant().content(reply.clone()).build());
                    ExecutionState::Done {
                        reply,
                        stop_reason: StopReason::StepLimit,
                    }
                }
                ExecutionState::Reason => {
                    steps += 1;
                    let response = self.reason(history, &definitions, steps).await?;
                    if let Some(u) = response.usage() {
                        usage += u;
                    }
                    let message = ChatMessage::from(response);
                    let next = ExecutionState::after_reply(message.tool_calls(), &message.content);
                    history.push(message);
                    next
                }
                ExecutionState::Act { calls } => {
                    for call in &calls {
                        let outcome = self.tools.dispatch(call).await;
                        summaries.push(ToolCallSummary::new(call, outcome.is_error()));
                        history.push(
                            ChatMessage::tool()
                                .tool_result(&call.id, &call.function.name, outcome.is_error())
                                .content(outcome.render())
                                .build(),
                        );
                    }
                    ExecutionState::Reason
                }
                ExecutionState::Done { reply, stop_reason } => {
                    return Ok(TurnOutcome {
                        reply,
                        tool_calls: summaries,
                        stop_reason,
                        steps,
                        usage,
                    });
                }
            };
        }
    }

    /// One model call over the system prompt plus the whole history.
    #[instrument(name = "agent.reason", skip(self, history, definitions))]
    async fn reason(
        &self,
        history: &[ChatMessage],
        definitions: &[Tool],
        step: usize,
    ) -> Result<Box<dyn ChatResponse>> {
        let user_name = context::get(ContextKey::UserName);
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(
            ChatMessage::system()
                .content(prompt::system_prompt(user_name.as_deref()))
                .build(),
        );
        messages.extend_from_slice(history);

        let tools = (!definitions.is_empty()).then_some(definitions);
        let limit = self.limits.llm_timeout();
        match tokio::time::timeout(limit, self.provider.chat_with_tools(&messages, tools)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(AgentError::ModelCall {
                step,
                reason: e.to_string(),
            }),
            Err(_) => Err(AgentError::ModelTimeout {
                step,
                seconds: limit.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RequestContext, scope};
    use crate::test_utils::{
        MockChatResponse, MockLlmProvider, MockSharePoint, MockSummarizer, ScriptedProvider,
        full_context,
    };
    use genie::chat::{ChatRole, MessageType};
    use genie::error::LLMError;
    use std::collections::HashSet;

    fn registry(api: MockSharePoint) -> ToolRegistry {
        ToolRegistry::sharepoint(Arc::new(api), Arc::new(MockSummarizer::new()))
    }

    fn history(text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::assistant()
                .content("Session initialized. How can I help you?")
                .build(),
            ChatMessage::user().content(text).build(),
        ]
    }

    #[tokio::test]
    async fn onedrive_id_question_end_to_end() {
        let mut api = MockSharePoint::new();
        api.expect_my_drive_id()
            .times(1)
            .returning(|_| Ok("b!XYZ".to_string()));
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(MockChatResponse::with_tools(
                "",
                vec![ToolCall::function("call_1", "get_one_drive_id", "{}")],
            )),
            Ok(MockChatResponse::text("Your OneDrive id is b!XYZ.")),
        ]));
        let agent = Agent::new(provider.clone(), registry(api), LimitsConfig::default());

        let mut messages = history("what is my onedrive id");
        let outcome = scope(full_context(), agent.run_turn(&mut messages))
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::EndTurn);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.reply.contains("b!XYZ"));
        assert_eq!(outcome.tool_calls.len(), 1);
        assert!(!outcome.tool_calls[0].is_error);

        // greeting, user, assistant(tool use), tool result, assistant
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3].role, ChatRole::Tool);
        assert_eq!(messages[3].tool_call_id(), Some("call_1"));
        assert_eq!(messages[3].content, "\"b!XYZ\"");
        assert_eq!(messages[4].content, "Your OneDrive id is b!XYZ.");

        // The second model call saw the tool result, behind the system prompt.
        let received = provider.received_messages().await;
        assert_eq!(received[1][0].role, ChatRole::System);
        assert!(received[1][0].content.contains("Test User"));
        assert_eq!(received[1].len(), 5);
    }

    #[tokio::test]
    async fn every_tool_request_gets_exactly_one_result() {
        let mut api = MockSharePoint::new();
        api.expect_my_drive_id().returning(|_| Ok("me".to_string()));
        api.expect_site_analytics().returning(|_| Ok(None));
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(MockChatResponse::with_tools(
                "",
                vec![
                    ToolCall::function("a", "get_one_drive_id", "{}"),
                    ToolCall::function("b", "get_site_analytics", "{}"),
                    ToolCall::function("c", "no_such_tool", "{}"),
                    ToolCall::function("d", "get_drive_id", "not json"),
                ],
            )),
            Ok(MockChatResponse::text("done")),
        ]));
        let agent = Agent::new(provider, registry(api), LimitsConfig::default());

        let mut messages = history("do things");
        let outcome = scope(full_context(), agent.run_turn(&mut messages))
            .await
            .unwrap();

        let requested: Vec<_> = messages[2].tool_calls().iter().map(|c| c.id.clone()).collect();
        let answered: Vec<_> = messages[3..7]
            .iter()
            .filter_map(|m| m.tool_call_id().map(str::to_string))
            .collect();
        assert_eq!(
            requested.iter().collect::<HashSet<_>>(),
            answered.iter().collect::<HashSet<_>>()
        );
        assert_eq!(answered.len(), 4);
        assert_eq!(messages[7].role, ChatRole::Assistant);

        let errors: Vec<_> = outcome.tool_calls.iter().map(|s| s.is_error).collect();
        assert_eq!(errors, vec![false, false, true, true]);
        assert!(matches!(
            messages[5].message_type,
            MessageType::ToolResult { is_error: true, .. }
        ));
        assert!(messages[5].content.starts_with("Error: unknown_tool"));
    }

    #[tokio::test]
    async fn tool_errors_flow_back_to_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(MockChatResponse::with_tools(
                "",
                vec![ToolCall::function("a", "get_one_drive_id", "{}")],
            )),
            Ok(MockChatResponse::text("Sorry, I could not reach your OneDrive.")),
        ]));
        let agent = Agent::new(
            provider.clone(),
            registry(MockSharePoint::new()),
            LimitsConfig::default(),
        );

        // No OBO token in context: the tool fails, the turn does not.
        let mut messages = history("what is my onedrive id");
        let outcome = scope(RequestContext::new(), agent.run_turn(&mut messages))
            .await
            .unwrap();
        assert!(outcome.tool_calls[0].is_error);
        assert!(messages[3].content.starts_with("Error: missing_credential"));
        assert_eq!(outcome.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn step_limit_stops_a_model_that_never_answers() {
        let mut api = MockSharePoint::new();
        api.expect_my_drive_id().returning(|_| Ok("me".to_string()));
        let responses = (0..10)
            .map(|i| {
                Ok(MockChatResponse::with_tools(
                    "",
                    vec![ToolCall::function(format!("c{}", i), "get_one_drive_id", "{}")],
                ))
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(responses));
        let agent = Agent::new(
            provider.clone(),
            registry(api),
            LimitsConfig::default().max_steps(3),
        );

        let mut messages = history("loop forever");
        let outcome = scope(full_context(), agent.run_turn(&mut messages))
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::StepLimit);
        assert_eq!(outcome.steps, 3);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.tool_calls.len(), 3);
        let last = messages.last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, outcome.reply);
        // Every request before the stop still has its result.
        assert_eq!(messages[messages.len() - 2].role, ChatRole::Tool);
    }

    #[tokio::test]
    async fn model_failure_is_controller_fatal() {
        let mut llm = MockLlmProvider::new();
        llm.expect_chat_with_tools()
            .returning(|_, _| Err(LLMError::ProviderError("HTTP 503: overloaded".into())));
        let agent = Agent::new(
            Arc::new(llm),
            registry(MockSharePoint::new()),
            LimitsConfig::default(),
        );

        let mut messages = history("hi");
        let err = scope(full_context(), agent.run_turn(&mut messages))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelCall { step: 1, .. }));
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_is_reported() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![]).with_delay(std::time::Duration::from_secs(600)),
        );
        let limits = LimitsConfig {
            llm_timeout_secs: 5,
            ..LimitsConfig::default()
        };
        let agent = Agent::new(provider, registry(MockSharePoint::new()), limits);

        let mut messages = history("hi");
        let err = agent.run_turn(&mut messages).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelTimeout { step: 1, seconds: 5 }));
    }

    #[tokio::test]
    async fn tools_are_offered_sorted() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(MockChatResponse::text("hello"))]));
        let agent = Agent::new(
            provider.clone(),
            registry(MockSharePoint::new()),
            LimitsConfig::default(),
        );
        let mut messages = history("hi");
        agent.run_turn(&mut messages).await.unwrap();

        let offered = provider.received_tools().await;
        let names: Vec<_> = offered[0].iter().map(|t| t.function.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names.len(), 9);
        assert_eq!(names, sorted);
    }
}
