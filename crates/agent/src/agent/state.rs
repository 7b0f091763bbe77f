use genie::ToolCall;
use serde::Serialize;

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools.
    EndTurn,
    /// The step limit was reached while the model still requested tools.
    StepLimit,
}

/// Position of the loop controller within a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionState {
    /// Ask the model for the next message.
    Reason,
    /// Run the tool calls of the latest assistant message.
    Act { calls: Vec<ToolCall> },
    Done { reply: String, stop_reason: StopReason },
}

impl ExecutionState {
    /// Returns a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Reason => "Reason",
            ExecutionState::Act { .. } => "Act",
            ExecutionState::Done { .. } => "Done",
        }
    }

    /// State following an assistant message.
    pub fn after_reply(calls: &[ToolCall], text: &str) -> Self {
        if calls.is_empty() {
            ExecutionState::Done {
                reply: text.to_string(),
                stop_reason: StopReason::EndTurn,
            }
        } else {
            ExecutionState::Act {
                calls: calls.to_vec(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_requests_lead_to_act() {
        let call = ToolCall::function("c1", "get_one_drive_id", "{}");
        let state = ExecutionState::after_reply(&[call.clone()], "");
        assert_eq!(state, ExecutionState::Act { calls: vec![call] });
        assert_eq!(state.name(), "Act");
    }

    #[test]
    fn plain_text_is_done() {
        let state = ExecutionState::after_reply(&[], "hello");
        assert_eq!(
            state,
            ExecutionState::Done {
                reply: "hello".to_string(),
                stop_reason: StopReason::EndTurn
            }
        );
    }
}
