use serde::Deserialize;
use std::time::Duration;

/// Bounds on one turn.
///
/// A *step* is one model call. A turn that keeps requesting tools stops once
/// `max_steps` model calls have run and their tool results are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_steps: usize,
    /// Deadline for a single model call, in seconds.
    pub llm_timeout_secs: u64,
    /// Deadline for a single tool call, in seconds.
    pub tool_timeout_secs: u64,
    /// Deadline for the whole turn, in seconds.
    pub turn_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            llm_timeout_secs: 120,
            tool_timeout_secs: 60,
            turn_timeout_secs: 300,
        }
    }
}

impl LimitsConfig {
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}
