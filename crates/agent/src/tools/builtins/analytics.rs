use async_trait::async_trait;
use genie::chat::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::credentials;
use crate::context::ContextKey;
use crate::graph::SharePointApi;
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

pub struct GetSiteAnalyticsTool {
    api: Arc<dyn SharePointApi>,
}

impl GetSiteAnalyticsTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for GetSiteAnalyticsTool {
    fn name(&self) -> &str {
        ToolName::GetSiteAnalytics.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Get all-time access statistics for the current SharePoint site. Returns null when none are available.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        let creds = credentials(&[ContextKey::AccessToken, ContextKey::SiteId])?;
        Ok(self.api.site_analytics(&creds).await?.unwrap_or(Value::Null))
    }
}
