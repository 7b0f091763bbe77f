//! Errors that abort a session operation.
//!
//! Tool failures never appear here: they are converted into tool results and
//! handed back to the model. What remains are session-boundary rejections,
//! identity/site failures at initialisation, and controller-fatal model errors.

use thiserror::Error;

use crate::session::SessionStoreError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    // --- Session boundary ---
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("session terminated: token mismatch")]
    TokenMismatch { session_id: String },

    #[error("session {session_id} already has a turn in progress")]
    SessionBusy { session_id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // --- Session initialisation ---
    #[error("site resolution failed for {site_url}: {reason}")]
    SiteResolution { site_url: String, reason: String },

    #[error("no application access token could be acquired")]
    MissingAccessToken,

    // --- Controller-fatal ---
    #[error("model call failed (step {step}): {reason}")]
    ModelCall { step: usize, reason: String },

    #[error("model call timed out after {seconds}s (step {step})")]
    ModelTimeout { step: usize, seconds: u64 },

    #[error("turn exceeded its deadline of {seconds}s")]
    TurnTimeout { seconds: u64 },

    // --- Storage ---
    #[error("session store error: {0}")]
    Store(#[from] SessionStoreError),
}

impl AgentError {
    /// Whether the error rejected the request before any model or tool call.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AgentError::SessionNotFound { .. }
                | AgentError::TokenMismatch { .. }
                | AgentError::SessionBusy { .. }
                | AgentError::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
