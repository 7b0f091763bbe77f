//! Common imports for embedding the assistant.

pub use crate::agent::{Agent, LimitsConfig, StopReason, TurnOutcome};
pub use crate::config::{GenieConfig, load_config};
pub use crate::error::AgentError;
pub use crate::service::{ChatReply, GenieService};
pub use crate::session::SessionId;
