//! Application and on-behalf-of token acquisition against Microsoft Entra ID.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use url::Url;

use crate::config::IdentityConfig;

/// Tokens obtained for one session. Either may be absent when acquisition
/// failed; callers surface that as a missing credential later on.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AcquiredTokens {
    pub access_token: Option<String>,
    pub obo_access_token: Option<String>,
}

impl fmt::Debug for AcquiredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredTokens")
            .field("access_token", &self.access_token.is_some())
            .field("obo_access_token", &self.obo_access_token.is_some())
            .finish()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquires the application token and, when `user_assertion` is given,
    /// an on-behalf-of token for that user. Never fails.
    async fn acquire(&self, user_assertion: Option<&str>) -> AcquiredTokens;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// OAuth2 v2.0 token endpoint client.
pub struct EntraTokenProvider {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl EntraTokenProvider {
    pub fn new(http: Client, cfg: &IdentityConfig) -> Result<Self, url::ParseError> {
        let mut authority = cfg.authority.clone();
        if !authority.ends_with('/') {
            authority.push('/');
        }
        let token_url =
            Url::parse(&authority)?.join(&format!("{}/oauth2/v2.0/token", cfg.tenant_id))?;
        let resource = cfg.resource.trim_end_matches('/');
        Ok(Self {
            http,
            token_url,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            scope: format!("{}/.default", resource),
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// The serializer is not `Send`, so it must not live across an await.
    fn form_body(&self, grant: &str, extra: &[(&str, &str)]) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", grant)
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("scope", &self.scope);
        for (k, v) in extra {
            form.append_pair(k, v);
        }
        form.finish()
    }

    async fn request(&self, grant: &str, extra: &[(&str, &str)]) -> Option<String> {
        let body = self.form_body(grant, extra);

        let resp = match self
            .http
            .post(self.token_url.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("token request ({}) failed: {}", grant, e);
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("token endpoint returned {} for {}: {}", status, grant, text);
            return None;
        }
        match resp.json::<TokenResponse>().await {
            Ok(TokenResponse { access_token }) => {
                debug!("acquired token via {}", grant);
                access_token.filter(|t| !t.is_empty())
            }
            Err(e) => {
                warn!("unreadable token response for {}: {}", grant, e);
                None
            }
        }
    }
}

#[async_trait]
impl TokenProvider for EntraTokenProvider {
    async fn acquire(&self, user_assertion: Option<&str>) -> AcquiredTokens {
        let access_token = self.request("client_credentials", &[]).await;
        let obo_access_token = match user_assertion.filter(|a| !a.is_empty()) {
            Some(assertion) => {
                self.request(
                    "urn:ietf:params:oauth:grant-type:jwt-bearer",
                    &[
                        ("requested_token_use", "on_behalf_of"),
                        ("assertion", assertion),
                    ],
                )
                .await
            }
            None => None,
        };
        AcquiredTokens {
            access_token,
            obo_access_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity(server: &MockServer) -> IdentityConfig {
        IdentityConfig {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            resource: "https://graph.microsoft.com/".to_string(),
            authority: server.uri(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn acquisition_runs_on_a_spawned_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "app"})))
            .mount(&server)
            .await;

        let provider: Arc<dyn TokenProvider> =
            Arc::new(EntraTokenProvider::new(Client::new(), &identity(&server)).unwrap());
        let tokens = tokio::spawn(async move { provider.acquire(Some("user-jwt")).await })
            .await
            .unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn acquires_app_and_obo_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "app"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("requested_token_use=on_behalf_of"))
            .and(body_string_contains("assertion=user-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "obo"})))
            .mount(&server)
            .await;

        let provider = EntraTokenProvider::new(Client::new(), &identity(&server)).unwrap();
        let tokens = provider.acquire(Some("user-jwt")).await;
        assert_eq!(tokens.access_token.as_deref(), Some("app"));
        assert_eq!(tokens.obo_access_token.as_deref(), Some("obo"));
    }

    #[tokio::test]
    async fn no_assertion_means_no_obo_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "app"})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = EntraTokenProvider::new(Client::new(), &identity(&server)).unwrap();
        let tokens = provider.acquire(None).await;
        assert_eq!(tokens.access_token.as_deref(), Some("app"));
        assert_eq!(tokens.obo_access_token, None);
    }

    #[tokio::test]
    async fn failure_status_yields_absent_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let provider = EntraTokenProvider::new(Client::new(), &identity(&server)).unwrap();
        let tokens = provider.acquire(Some("stale")).await;
        assert_eq!(tokens, AcquiredTokens::default());
    }

    #[test]
    fn debug_hides_token_values() {
        let tokens = AcquiredTokens {
            access_token: Some("very-secret".into()),
            obo_access_token: None,
        };
        assert!(!format!("{:?}", tokens).contains("very-secret"));
    }
}
