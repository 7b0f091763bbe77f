//! Request-scoped identity and site values.
//!
//! Tools receive only the arguments the model supplies, so the credentials and
//! site identifiers they need travel in a task-local [`RequestContext`]. Each
//! turn runs inside its own [`scope`]; concurrent turns never share one.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// The closed set of values a request context may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextKey {
    #[serde(rename = "SITE_URL")]
    SiteUrl,
    #[serde(rename = "SITE_ID")]
    SiteId,
    #[serde(rename = "USER_NAME")]
    UserName,
    /// The caller's delegated bearer token, used as the on-behalf-of assertion.
    #[serde(rename = "USER_ASSERTION")]
    UserAssertion,
    /// Application (client credentials) token.
    #[serde(rename = "ACCESS_TOKEN")]
    AccessToken,
    /// On-behalf-of token acting as the end user.
    #[serde(rename = "OBO_ACCESS_TOKEN")]
    OboAccessToken,
}

impl ContextKey {
    pub const ALL: [ContextKey; 6] = [
        ContextKey::SiteUrl,
        ContextKey::SiteId,
        ContextKey::UserName,
        ContextKey::UserAssertion,
        ContextKey::AccessToken,
        ContextKey::OboAccessToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::SiteUrl => "SITE_URL",
            ContextKey::SiteId => "SITE_ID",
            ContextKey::UserName => "USER_NAME",
            ContextKey::UserAssertion => "USER_ASSERTION",
            ContextKey::AccessToken => "ACCESS_TOKEN",
            ContextKey::OboAccessToken => "OBO_ACCESS_TOKEN",
        }
    }

    /// Whether the value is a credential that must never be logged.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            ContextKey::UserAssertion | ContextKey::AccessToken | ContextKey::OboAccessToken
        )
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized context key: {0}")]
pub struct UnknownContextKey(pub String);

impl FromStr for ContextKey {
    type Err = UnknownContextKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownContextKey(s.to_string()))
    }
}

/// A snapshot of recognized key/value pairs.
///
/// Merging never lets an absent or empty value replace an existing one, and
/// unrecognized keys are dropped.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext {
    values: BTreeMap<ContextKey, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`RequestContext::merge_value`].
    pub fn with(mut self, key: ContextKey, value: impl Into<String>) -> Self {
        self.merge_value(key, Some(value));
        self
    }

    /// Sets `key` unless `value` is absent or empty. Returns whether it was stored.
    pub fn merge_value<V: Into<String>>(&mut self, key: ContextKey, value: Option<V>) -> bool {
        match value.map(Into::into) {
            Some(value) if !value.is_empty() => {
                self.values.insert(key, value);
                true
            }
            _ => false,
        }
    }

    /// Merges string-keyed pairs, dropping keys outside [`ContextKey`].
    pub fn merge<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            match name.as_ref().parse::<ContextKey>() {
                Ok(key) => {
                    self.merge_value(key, value);
                }
                Err(e) => log::debug!("dropping value: {}", e),
            }
        }
    }

    /// Merges every value of `other` into `self` under the same rules.
    pub fn merge_from(&mut self, other: &RequestContext) {
        for (key, value) in &other.values {
            self.merge_value(*key, Some(value.as_str()));
        }
    }

    pub fn get(&self, key: ContextKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if key.is_secret() {
                map.entry(&key.as_str(), &"<redacted>");
            } else {
                map.entry(&key.as_str(), value);
            }
        }
        map.finish()
    }
}

tokio::task_local! {
    static CURRENT: RefCell<RequestContext>;
}

/// Runs `fut` with its own context, seeded from `initial`.
pub async fn scope<F>(initial: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(RefCell::new(initial), fut).await
}

/// Whether the caller runs inside a [`scope`].
pub fn in_scope() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

/// Merges `pairs` into the current scope and returns the updated snapshot.
/// Outside a scope nothing is stored and an empty snapshot is returned.
pub fn set<I, K, V>(pairs: I) -> RequestContext
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: Into<String>,
{
    CURRENT
        .try_with(|cell| {
            let mut ctx = cell.borrow_mut();
            ctx.merge(pairs);
            ctx.clone()
        })
        .unwrap_or_default()
}

/// Merges a typed snapshot into the current scope.
pub fn set_all(values: &RequestContext) -> RequestContext {
    CURRENT
        .try_with(|cell| {
            let mut ctx = cell.borrow_mut();
            ctx.merge_from(values);
            ctx.clone()
        })
        .unwrap_or_default()
}

pub fn get(key: ContextKey) -> Option<String> {
    CURRENT
        .try_with(|cell| cell.borrow().get(key).map(str::to_owned))
        .ok()
        .flatten()
}

/// Looks a value up by its wire name; unrecognized names are always absent.
pub fn get_named(name: &str) -> Option<String> {
    name.parse::<ContextKey>().ok().and_then(get)
}

pub fn clear() {
    let _ = CURRENT.try_with(|cell| *cell.borrow_mut() = RequestContext::default());
}

pub fn snapshot() -> RequestContext {
    CURRENT
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_value_never_overwrites() {
        scope(RequestContext::new(), async {
            set([("SITE_ID", Some("A"))]);
            set([("SITE_ID", None::<&str>)]);
            assert_eq!(get(ContextKey::SiteId).as_deref(), Some("A"));

            set([("SITE_ID", Some(""))]);
            assert_eq!(get(ContextKey::SiteId).as_deref(), Some("A"));
        })
        .await;
    }

    #[tokio::test]
    async fn unknown_keys_are_dropped() {
        scope(RequestContext::new(), async {
            let updated = set([("FOO", Some("bar")), ("SITE_URL", Some("https://x"))]);
            assert_eq!(get_named("FOO"), None);
            assert_eq!(updated.len(), 1);
            assert_eq!(get_named("SITE_URL").as_deref(), Some("https://x"));
        })
        .await;
    }

    #[tokio::test]
    async fn clear_resets_and_snapshot_copies() {
        let seed = RequestContext::new().with(ContextKey::AccessToken, "tok");
        scope(seed, async {
            let snap = snapshot();
            clear();
            assert!(snapshot().is_empty());
            assert_eq!(snap.get(ContextKey::AccessToken), Some("tok"));
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_scopes_are_isolated() {
        let a = tokio::spawn(scope(
            RequestContext::new().with(ContextKey::SiteId, "site-a"),
            async {
                tokio::task::yield_now().await;
                get(ContextKey::SiteId)
            },
        ));
        let b = tokio::spawn(scope(
            RequestContext::new().with(ContextKey::SiteId, "site-b"),
            async {
                tokio::task::yield_now().await;
                get(ContextKey::SiteId)
            },
        ));
        assert_eq!(a.await.unwrap().as_deref(), Some("site-a"));
        assert_eq!(b.await.unwrap().as_deref(), Some("site-b"));
    }

    #[test]
    fn outside_scope_is_absent_not_a_panic() {
        assert!(!in_scope());
        assert_eq!(get(ContextKey::SiteId), None);
        assert!(set([("SITE_ID", Some("A"))]).is_empty());
    }

    #[test]
    fn debug_redacts_tokens() {
        let ctx = RequestContext::new()
            .with(ContextKey::OboAccessToken, "secret-token")
            .with(ContextKey::SiteUrl, "https://contoso.sharepoint.com");
        let rendered = format!("{:?}", ctx);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("contoso"));
    }
}
