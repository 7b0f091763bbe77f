//! HTTP routes for session initialisation and chat turns.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use genie_agent::{AgentError, ChatReply, GenieService, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<GenieService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub site_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/session/init", post(handle_init))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_init(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<InitRequest>,
) -> Result<Json<InitResponse>, (StatusCode, String)> {
    let bearer = bearer_token(&headers);
    let session_id = state
        .service
        .init_session(&req.site_url, bearer)
        .await
        .map_err(error_response)?;
    info!(session_id = %session_id, "session initialized");
    Ok(Json(InitResponse { session_id }))
}

async fn handle_chat(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    let bearer = bearer_token(&headers);
    let session_id = SessionId::from(req.session_id);
    let reply = state
        .service
        .chat(&session_id, bearer, &req.message)
        .await
        .map_err(error_response)?;
    Ok(Json(reply))
}

/// The delegated token from `Authorization: Bearer <token>`, if any. The
/// scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

pub fn error_response(err: AgentError) -> (StatusCode, String) {
    let status = match &err {
        AgentError::SessionNotFound { .. } => {
            return (StatusCode::NOT_FOUND, "Invalid sessionId".to_string());
        }
        AgentError::TokenMismatch { .. } => {
            warn!("rejected turn with a different delegated token");
            return (
                StatusCode::UNAUTHORIZED,
                "Session terminated: token mismatch".to_string(),
            );
        }
        AgentError::SessionBusy { .. } => StatusCode::CONFLICT,
        AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AgentError::SiteResolution { .. }
        | AgentError::MissingAccessToken
        | AgentError::ModelCall { .. } => StatusCode::BAD_GATEWAY,
        AgentError::ModelTimeout { .. } | AgentError::TurnTimeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    (status, err.to_string())
}
