//! Configuration loading from TOML files.
//!
//! `${VAR}` and `${VAR:-default}` references are replaced from the environment
//! before parsing, so secrets can stay out of the file.

use anyhow::{Context, Result, anyhow};
use genie::providers::openai::{AuthType, OpenAIConfig};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::agent::LimitsConfig;
use crate::graph::client::DEFAULT_GRAPH_URL;

pub const DEFAULT_RESOURCE: &str = "https://graph.microsoft.com/";
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, Deserialize)]
pub struct GenieConfig {
    pub identity: IdentityConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    pub llm: ModelConfig,
    /// Embedding model for document summaries; falls back to `llm`.
    #[serde(default)]
    pub embedding: Option<ModelConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl GenieConfig {
    pub fn embedding(&self) -> &ModelConfig {
        self.embedding.as_ref().unwrap_or(&self.llm)
    }
}

/// Entra ID application registration.
#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Resource whose `.default` scope is requested.
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default = "default_authority")]
    pub authority: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource", &self.resource)
            .field("authority", &self.authority)
            .finish()
    }
}

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    /// Per-request timeout for Graph calls.
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_url(),
            timeout_secs: default_graph_timeout(),
        }
    }
}

impl GraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_graph_timeout() -> u64 {
    30
}

/// An OpenAI-compatible chat or embedding deployment.
#[derive(Clone, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub auth: AuthType,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl ModelConfig {
    pub fn to_openai(&self) -> Result<OpenAIConfig> {
        let base_url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid model endpoint: {}", self.endpoint))?;
        Ok(OpenAIConfig {
            base_url,
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            api_version: self.api_version.clone(),
            auth_type: self.auth,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_seconds: self.timeout_secs,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

/// Load configuration from a TOML file
pub async fn load_config(path: impl AsRef<Path>) -> Result<GenieConfig> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    parse_config(&content)
}

/// Interpolates, parses and validates configuration text.
pub fn parse_config(content: &str) -> Result<GenieConfig> {
    let processed = interpolate_env_vars(content)?;
    let config: GenieConfig =
        toml::from_str(&processed).with_context(|| "Failed to parse genie config")?;
    validate_identity(&config.identity)?;
    validate_model("llm", &config.llm)?;
    if let Some(embedding) = &config.embedding {
        validate_model("embedding", embedding)?;
    }
    validate_limits(&config.limits)?;
    Url::parse(&config.graph.base_url)
        .with_context(|| format!("Invalid graph base_url: {}", config.graph.base_url))?;
    Ok(config)
}

/// Interpolate environment variables in config content
pub fn interpolate_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .context("Failed to compile env var regex")?;

    let mut errors = Vec::new();

    let result = re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str());

        match (std::env::var(var_name), default) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                errors.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !errors.is_empty() {
        return Err(anyhow!(
            "Required environment variables not set: {}",
            errors.join(", ")
        ));
    }

    Ok(result.into_owned())
}

fn validate_identity(identity: &IdentityConfig) -> Result<()> {
    for (field, value) in [
        ("tenant_id", &identity.tenant_id),
        ("client_id", &identity.client_id),
        ("client_secret", &identity.client_secret),
    ] {
        if value.trim().is_empty() {
            return Err(anyhow!("identity.{} must not be empty", field));
        }
    }
    Url::parse(&identity.authority)
        .with_context(|| format!("Invalid identity authority: {}", identity.authority))?;
    Ok(())
}

fn validate_model(section: &str, model: &ModelConfig) -> Result<()> {
    if model.model.trim().is_empty() {
        return Err(anyhow!("{}.model must not be empty", section));
    }
    if model.auth == AuthType::ApiKey && model.api_version.is_none() {
        return Err(anyhow!(
            "{}.api_version is required when auth = \"api_key\"",
            section
        ));
    }
    model.to_openai().map(|_| ())
}

fn validate_limits(limits: &LimitsConfig) -> Result<()> {
    if limits.max_steps == 0 {
        return Err(anyhow!("limits.max_steps must be at least 1"));
    }
    if limits.llm_timeout_secs == 0
        || limits.tool_timeout_secs == 0
        || limits.turn_timeout_secs == 0
    {
        return Err(anyhow!("limits timeouts must be at least 1 second"));
    }
    Ok(())
}
