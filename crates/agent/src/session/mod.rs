//! Conversation sessions.
//!
//! A session binds one site and one identity to a growing message history.
//! The request-context snapshot captured at initialisation is replayed into
//! every later turn.

use async_trait::async_trait;
use genie::chat::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

use crate::context::RequestContext;

pub mod in_memory;

pub use in_memory::InMemorySessionStore;

/// Opaque session identifier: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub messages: Vec<ChatMessage>,
    /// Identity and site values captured when the session was initialised.
    pub context: RequestContext,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn new(context: RequestContext, messages: Vec<ChatMessage>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: SessionId::new(),
            messages,
            context,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),

    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    #[error("session backend error: {0}")]
    Backend(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionStoreError>;

/// Storage for sessions. Appends are the only way history changes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> SessionResult<()>;

    async fn get(&self, id: &SessionId) -> SessionResult<Option<Session>>;

    /// Appends `messages` in one step: either all of them land or none do.
    async fn append_messages(
        &self,
        id: &SessionId,
        messages: Vec<ChatMessage>,
    ) -> SessionResult<()>;

    async fn delete(&self, id: &SessionId) -> SessionResult<()>;
}
