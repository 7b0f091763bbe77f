use async_trait::async_trait;
use genie::chat::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{Session, SessionId, SessionResult, SessionStore, SessionStoreError};

/// Process-local session storage. Sessions are lost on restart.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionStoreError::AlreadyExists(session.id));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> SessionResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn append_messages(
        &self,
        id: &SessionId,
        messages: Vec<ChatMessage>,
    ) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.clone()))?;
        session.messages.extend(messages);
        session.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> SessionResult<()> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SessionStoreError::NotFound(id.clone()))
    }
}
