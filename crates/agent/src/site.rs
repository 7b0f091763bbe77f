//! Resolves a SharePoint site URL to its Graph site id.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("invalid site URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no access token available")]
    MissingToken,

    #[error("site lookup returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("site lookup failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait SiteResolver: Send + Sync {
    async fn resolve(
        &self,
        site_url: &str,
        access_token: Option<&str>,
    ) -> Result<String, SiteError>;
}

#[derive(Deserialize)]
struct Site {
    id: String,
}

pub struct GraphSiteResolver {
    http: Client,
    base_url: Url,
}

impl GraphSiteResolver {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// `https://host/sites/team/` → `{base}sites/host:/sites/team`
    fn lookup_url(&self, site_url: &str) -> Result<Url, SiteError> {
        let invalid = |reason: String| SiteError::InvalidUrl {
            url: site_url.to_string(),
            reason,
        };
        let parsed = Url::parse(site_url).map_err(|e| invalid(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let site_path = parsed.path().trim_matches('/');

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("Graph base URL cannot be a base".to_string()))?;
            segments.pop_if_empty().push("sites");
            if site_path.is_empty() {
                segments.push(host);
            } else {
                segments.push(&format!("{}:", host));
                segments.extend(site_path.split('/'));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SiteResolver for GraphSiteResolver {
    async fn resolve(
        &self,
        site_url: &str,
        access_token: Option<&str>,
    ) -> Result<String, SiteError> {
        let token = access_token.ok_or(SiteError::MissingToken)?;
        let url = self.lookup_url(site_url)?;
        debug!("resolving site id via {}", url);
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SiteError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json::<Site>().await?.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> GraphSiteResolver {
        let base = Url::parse(&format!("{}/v1.0/", server.uri())).unwrap();
        GraphSiteResolver::new(Client::new(), base)
    }

    #[tokio::test]
    async fn resolves_site_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/sites/contoso.sharepoint.com:/sites/hr"))
            .and(bearer_token("app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "contoso.sharepoint.com,abc,def"
            })))
            .mount(&server)
            .await;

        let id = resolver(&server)
            .resolve("https://contoso.sharepoint.com/sites/hr/", Some("app"))
            .await
            .unwrap();
        assert_eq!(id, "contoso.sharepoint.com,abc,def");
    }

    #[tokio::test]
    async fn root_site_has_no_path_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/sites/contoso.sharepoint.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "root"})))
            .mount(&server)
            .await;

        let id = resolver(&server)
            .resolve("https://contoso.sharepoint.com", Some("app"))
            .await
            .unwrap();
        assert_eq!(id, "root");
    }

    #[tokio::test]
    async fn failures_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no site"))
            .mount(&server)
            .await;
        let resolver = resolver(&server);

        let err = resolver
            .resolve("https://contoso.sharepoint.com/sites/x", Some("app"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::Status { status: 404, .. }));

        let err = resolver.resolve("not a url", Some("app")).await.unwrap_err();
        assert!(matches!(err, SiteError::InvalidUrl { .. }));

        let err = resolver
            .resolve("https://contoso.sharepoint.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::MissingToken));
    }
}
