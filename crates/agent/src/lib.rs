//! SharePoint and OneDrive assistant.
//!
//! A session is initialised once per site and identity. Each chat turn then
//! runs the [`agent::Agent`] loop over the session history, letting the model
//! call the Graph-backed tools in [`tools`].

pub mod error;
pub mod prelude;

pub mod config;
pub mod service;

pub mod agent;
pub mod auth;
pub mod context;
pub mod extract;
pub mod graph;
pub mod session;
pub mod site;
pub mod summarize;
pub mod tools;

#[cfg(test)]
pub mod test_utils;

pub use error::{AgentError, Result};

pub use agent::{Agent, LimitsConfig, StopReason, ToolCallSummary, TurnOutcome};
pub use context::{ContextKey, RequestContext};
pub use service::{ChatReply, GenieService};
pub use session::{InMemorySessionStore, SessionId, SessionStore};
