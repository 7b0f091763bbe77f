use crate::context::{ContextKey, RequestContext};

/// A context holding every value a tool may need.
pub fn full_context() -> RequestContext {
    RequestContext::new()
        .with(ContextKey::SiteUrl, "https://contoso.sharepoint.com/sites/team")
        .with(ContextKey::SiteId, "site-1")
        .with(ContextKey::UserName, "Test User")
        .with(ContextKey::UserAssertion, "user-jwt")
        .with(ContextKey::AccessToken, "app")
        .with(ContextKey::OboAccessToken, "obo")
}
