//! Session boundary: initialise a session for a site, then run chat turns.

use anyhow::Context as _;
use genie::LLMProviderFromHTTP;
use genie::chat::{ChatMessage, ChatProvider};
use genie::embedding::EmbeddingProvider;
use genie::providers::openai::OpenAI;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::instrument;
use url::Url;

use crate::agent::{Agent, StopReason, ToolCallSummary};
use crate::auth::{EntraTokenProvider, TokenProvider};
use crate::config::GenieConfig;
use crate::context::{self, ContextKey, RequestContext};
use crate::error::{AgentError, Result};
use crate::graph::{GraphClient, GraphCredentials, SharePointApi};
use crate::session::{InMemorySessionStore, Session, SessionId, SessionStore};
use crate::site::{GraphSiteResolver, SiteResolver};
use crate::summarize::RetrievalSummarizer;
use crate::tools::ToolRegistry;

pub const GREETING: &str = "Session initialized. How can I help you?";

/// Answer to one chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: SessionId,
    pub reply: String,
    pub tool_calls: Vec<ToolCallSummary>,
    pub stop_reason: StopReason,
}

pub struct GenieService {
    tokens: Arc<dyn TokenProvider>,
    sites: Arc<dyn SiteResolver>,
    graph: Arc<dyn SharePointApi>,
    store: Arc<dyn SessionStore>,
    agent: Agent,
    in_flight: Arc<Mutex<HashSet<SessionId>>>,
}

/// Marks a session busy until dropped.
struct TurnGuard {
    id: SessionId,
    in_flight: Arc<Mutex<HashSet<SessionId>>>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.id);
    }
}

impl GenieService {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        sites: Arc<dyn SiteResolver>,
        graph: Arc<dyn SharePointApi>,
        store: Arc<dyn SessionStore>,
        agent: Agent,
    ) -> Self {
        Self {
            tokens,
            sites,
            graph,
            store,
            agent,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Wires the production collaborators described by `config`.
    pub fn from_config(config: &GenieConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.graph.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let graph_url = Url::parse(&config.graph.base_url)
            .with_context(|| format!("Invalid graph base_url: {}", config.graph.base_url))?;

        let tokens = EntraTokenProvider::new(http.clone(), &config.identity)
            .context("Invalid identity authority")?;
        let sites = GraphSiteResolver::new(http.clone(), graph_url.clone());
        let graph: Arc<dyn SharePointApi> = Arc::new(GraphClient::with_client(http, graph_url));

        let chat: Arc<dyn ChatProvider> = Arc::new(LLMProviderFromHTTP::new(Arc::new(
            OpenAI::new(config.llm.to_openai()?),
        )));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LLMProviderFromHTTP::new(Arc::new(
            OpenAI::new(config.embedding().to_openai()?),
        )));
        let summarizer = RetrievalSummarizer::new(chat.clone(), embedder);
        let tools = ToolRegistry::sharepoint(graph.clone(), Arc::new(summarizer));
        let agent = Agent::new(chat, tools, config.limits.clone());

        Ok(Self::new(
            Arc::new(tokens),
            Arc::new(sites),
            graph,
            Arc::new(InMemorySessionStore::new()),
            agent,
        ))
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Acquires tokens, resolves the site and stores a new session bound to
    /// them. `bearer` is the caller's delegated token, if any.
    #[instrument(
        name = "service.init_session",
        skip(self, bearer),
        fields(has_bearer = bearer.is_some())
    )]
    pub async fn init_session(&self, site_url: &str, bearer: Option<&str>) -> Result<SessionId> {
        let site_url = site_url.trim();
        if site_url.is_empty() {
            return Err(AgentError::InvalidRequest("siteUrl is required".to_string()));
        }
        let bearer = bearer.filter(|b| !b.is_empty());

        let tokens = self.tokens.acquire(bearer).await;
        let access_token = tokens
            .access_token
            .clone()
            .ok_or(AgentError::MissingAccessToken)?;
        let site_id = self
            .sites
            .resolve(site_url, Some(&access_token))
            .await
            .map_err(|e| AgentError::SiteResolution {
                site_url: site_url.to_string(),
                reason: e.to_string(),
            })?;

        let mut values = RequestContext::new()
            .with(ContextKey::SiteUrl, site_url)
            .with(ContextKey::SiteId, site_id.clone())
            .with(ContextKey::AccessToken, access_token.clone());
        values.merge_value(ContextKey::UserAssertion, bearer);
        values.merge_value(ContextKey::OboAccessToken, tokens.obo_access_token.clone());

        let creds = GraphCredentials {
            site_id: Some(site_id),
            access_token: Some(access_token),
            obo_access_token: tokens.obo_access_token,
        };
        if creds.obo_access_token.is_some() {
            match self.graph.my_display_name(&creds).await {
                Ok(name) => {
                    values.merge_value(ContextKey::UserName, name);
                }
                Err(e) => debug!("display name unavailable: {}", e),
            }
        }

        let greeting = ChatMessage::assistant().content(GREETING).build();
        let session = Session::new(values, vec![greeting]);
        let id = session.id.clone();
        self.store.create(session).await?;
        info!("session {} initialized for {}", id, site_url);
        Ok(id)
    }

    /// Runs one turn. Unknown sessions, token mismatches and concurrent turns
    /// are rejected before the model is called. Messages are committed only
    /// when the turn completes.
    #[instrument(
        name = "service.chat",
        skip(self, session_id, bearer, message),
        fields(session_id = %session_id)
    )]
    pub async fn chat(
        &self,
        session_id: &SessionId,
        bearer: Option<&str>,
        message: &str,
    ) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(AgentError::InvalidRequest("message is required".to_string()));
        }
        let session = self.load(session_id).await?;
        if let Some(captured) = session.context.get(ContextKey::UserAssertion)
            && bearer != Some(captured)
        {
            return Err(AgentError::TokenMismatch {
                session_id: session_id.to_string(),
            });
        }

        let _guard = self.begin_turn(session_id)?;
        // Another turn may have committed since the first read.
        let session = self.load(session_id).await?;

        let mut history = session.messages;
        let committed = history.len();
        history.push(ChatMessage::user().content(message).build());

        let seed = session.context;
        let outcome = context::scope(RequestContext::new(), async {
            context::set_all(&seed);
            self.agent.run_turn(&mut history).await
        })
        .await?;

        self.store
            .append_messages(session_id, history.split_off(committed))
            .await?;
        debug!(
            "turn finished after {} steps ({} tool calls)",
            outcome.steps,
            outcome.tool_calls.len()
        );

        Ok(ChatReply {
            session_id: session_id.clone(),
            reply: outcome.reply,
            tool_calls: outcome.tool_calls,
            stop_reason: outcome.stop_reason,
        })
    }

    async fn load(&self, id: &SessionId) -> Result<Session> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    fn begin_turn(&self, id: &SessionId) -> Result<TurnGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(id.clone()) {
            return Err(AgentError::SessionBusy {
                session_id: id.to_string(),
            });
        }
        Ok(TurnGuard {
            id: id.clone(),
            in_flight: self.in_flight.clone(),
        })
    }
}
